//! Spreadsheet-compatible CSV for the three exported record kinds.
//!
//! Encoding quotes a field only when it holds a comma, a double quote or a
//! line break, doubles interior quotes, and prefixes the text with a UTF-8
//! byte-order marker. Decoding is a full quote-aware parse, so a quoted field
//! with a literal comma reads back intact. Decoding never errors: anything it
//! cannot use comes back as `None`, which callers treat as "no data".

use std::collections::HashMap;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::warn;
use uuid::Uuid;

use crate::error::{DashboardError, DashboardResult};
use crate::models::{
    Details, KnowledgeCategory, LexiconPoint, Project, ProjectStatus, WeeklyReport,
};

pub const BOM: char = '\u{FEFF}';

pub const WEEKLY_HEADER: [&str; 9] = [
    "weekRange",
    "projectId",
    "name",
    "category",
    "expectedWork",
    "status",
    "completion",
    "issues",
    "notes",
];
pub const LEXICON_HEADER: [&str; 3] = ["week", "total", "new"];
pub const KNOWLEDGE_HEADER: [&str; 3] = ["category", "description", "details"];

fn write_rows<I>(header: &[&str], rows: I) -> DashboardResult<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| DashboardError::Io(err.into_error()))?;
    let body = String::from_utf8(bytes)
        .map_err(|err| DashboardError::validation(format!("csv output is not utf-8: {err}")))?;

    let mut text = String::with_capacity(body.len() + BOM.len_utf8());
    text.push(BOM);
    text.push_str(&body);
    Ok(text)
}

/// Parses the data rows after the header. Fewer than two non-empty lines, a
/// structural parse error, or zero usable rows all yield `None`.
fn read_rows(text: &str) -> Option<Vec<StringRecord>> {
    let body = text.strip_prefix(BOM).unwrap_or(text);
    let non_empty = body.lines().filter(|line| !line.trim().is_empty()).count();
    if non_empty < 2 {
        return None;
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record),
            Err(err) => {
                warn!(target: "dashboard::csv", error = %err, "malformed csv row");
                return None;
            }
        }
    }

    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn field(record: &StringRecord, index: usize) -> String {
    record.get(index).unwrap_or_default().to_string()
}

fn optional_field(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn count_field(record: &StringRecord, index: usize) -> u32 {
    record
        .get(index)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn is_json_text(cell: &str) -> bool {
    serde_json::from_str::<Vec<String>>(cell).is_ok() || serde_json::from_str::<String>(cell).is_ok()
}

/// Lists of two or more plain lines are written one item per line, the way a
/// spreadsheet user would type them. Any shape that would read back
/// differently is written as JSON instead.
fn details_cell(details: Option<&Details>) -> DashboardResult<String> {
    let cell = match details {
        None => String::new(),
        Some(Details::Single(text)) => {
            if text.is_empty() || text.contains('\n') || is_json_text(text) {
                serde_json::to_string(text)?
            } else {
                text.clone()
            }
        }
        Some(Details::List(items)) => {
            let joined = items.join("\n");
            let plain_lines = items.len() >= 2
                && items
                    .iter()
                    .all(|item| !item.is_empty() && !item.contains(['\n', '\r']));
            if plain_lines && !is_json_text(&joined) {
                joined
            } else {
                serde_json::to_string(items)?
            }
        }
    };
    Ok(cell)
}

fn parse_details_cell(cell: &str) -> Option<Details> {
    if cell.is_empty() {
        None
    } else if let Ok(items) = serde_json::from_str::<Vec<String>>(cell) {
        Some(Details::List(items))
    } else if let Ok(text) = serde_json::from_str::<String>(cell) {
        Some(Details::Single(text))
    } else if cell.contains('\n') {
        Some(Details::List(
            cell.lines().map(|line| line.trim_end_matches('\r').to_string()).collect(),
        ))
    } else {
        Some(Details::Single(cell.to_string()))
    }
}

pub fn encode_weekly_reports(reports: &[WeeklyReport]) -> DashboardResult<String> {
    let rows = reports.iter().flat_map(|report| {
        report.projects.iter().map(move |project| {
            vec![
                report.week_range.clone(),
                project.id.clone(),
                project.name.clone(),
                project.category.clone(),
                project.expected_work.clone(),
                project.status.as_str().to_string(),
                project.completion.clone(),
                project.issues.clone().unwrap_or_default(),
                project.notes.clone().unwrap_or_default(),
            ]
        })
    });
    write_rows(&WEEKLY_HEADER, rows)
}

/// Rows are regrouped by week range in first-seen order.
pub fn decode_weekly_reports(text: &str) -> Option<Vec<WeeklyReport>> {
    let rows = read_rows(text)?;
    let mut reports: Vec<WeeklyReport> = Vec::new();
    let mut index_by_week: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let week_range = field(&row, 0);
        if week_range.trim().is_empty() {
            continue;
        }

        let raw_status = field(&row, 5);
        let status = raw_status.parse().unwrap_or_else(|_| {
            warn!(target: "dashboard::csv", status = %raw_status, "unknown status, using pending");
            ProjectStatus::Pending
        });

        let id = optional_field(&row, 1).unwrap_or_else(|| Uuid::new_v4().to_string());
        let project = Project {
            id,
            name: field(&row, 2),
            category: field(&row, 3),
            expected_work: field(&row, 4),
            status,
            completion: field(&row, 6),
            issues: optional_field(&row, 7),
            notes: optional_field(&row, 8),
        };

        let slot = *index_by_week.entry(week_range.clone()).or_insert_with(|| {
            reports.push(WeeklyReport {
                week_range,
                projects: Vec::new(),
            });
            reports.len() - 1
        });
        reports[slot].projects.push(project);
    }

    if reports.is_empty() {
        None
    } else {
        Some(reports)
    }
}

pub fn encode_lexicon(points: &[LexiconPoint]) -> DashboardResult<String> {
    let rows = points.iter().map(|point| {
        vec![
            point.week.clone(),
            point.total.to_string(),
            point.added.to_string(),
        ]
    });
    write_rows(&LEXICON_HEADER, rows)
}

pub fn decode_lexicon(text: &str) -> Option<Vec<LexiconPoint>> {
    let points: Vec<LexiconPoint> = read_rows(text)?
        .iter()
        .filter(|row| !field(row, 0).trim().is_empty())
        .map(|row| LexiconPoint {
            week: field(row, 0),
            total: count_field(row, 1),
            added: count_field(row, 2),
        })
        .collect();

    if points.is_empty() {
        None
    } else {
        Some(points)
    }
}

pub fn encode_knowledge_base(rows: &[KnowledgeCategory]) -> DashboardResult<String> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(vec![
            row.category.clone(),
            row.description.clone(),
            details_cell(row.details.as_ref())?,
        ]);
    }
    write_rows(&KNOWLEDGE_HEADER, records)
}

pub fn decode_knowledge_base(text: &str) -> Option<Vec<KnowledgeCategory>> {
    let categories: Vec<KnowledgeCategory> = read_rows(text)?
        .iter()
        .filter(|row| !field(row, 0).trim().is_empty())
        .map(|row| KnowledgeCategory {
            category: field(row, 0),
            description: field(row, 1),
            details: parse_details_cell(&field(row, 2)),
        })
        .collect();

    if categories.is_empty() {
        None
    } else {
        Some(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tracing_test::traced_test;

    fn project(id: &str, status: ProjectStatus) -> Project {
        Project {
            id: id.to_string(),
            name: format!("Project {id}"),
            category: "Voice-to-text".to_string(),
            expected_work: "Ship it".to_string(),
            status,
            completion: "Done".to_string(),
            issues: None,
            notes: None,
        }
    }

    fn plain_text(rng: &mut StdRng) -> String {
        const WORDS: [&str; 8] = ["lexicon", "review", "部署", "guide", "FAQ", "sync", "42", "queue"];
        let len = rng.gen_range(1..4);
        (0..len)
            .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn optional_text(rng: &mut StdRng) -> Option<String> {
        if rng.gen_bool(0.5) {
            Some(plain_text(rng))
        } else {
            None
        }
    }

    fn random_reports(rng: &mut StdRng) -> Vec<WeeklyReport> {
        let statuses = [
            ProjectStatus::Completed,
            ProjectStatus::InProgress,
            ProjectStatus::Pending,
        ];
        (0..rng.gen_range(1..5))
            .map(|week| WeeklyReport {
                week_range: format!("7/{}-7/{}", week * 7 + 1, week * 7 + 7),
                projects: (0..rng.gen_range(1..6))
                    .map(|n| Project {
                        id: format!("p-{week}-{n}"),
                        name: plain_text(rng),
                        category: plain_text(rng),
                        expected_work: plain_text(rng),
                        status: statuses[rng.gen_range(0..3)],
                        completion: plain_text(rng),
                        issues: optional_text(rng),
                        notes: optional_text(rng),
                    })
                    .collect(),
            })
            .collect()
    }

    #[test]
    fn output_starts_with_bom_and_header() {
        let text = encode_weekly_reports(&[]).unwrap();
        assert!(text.starts_with(BOM));
        assert_eq!(
            text.trim_start_matches(BOM).trim_end(),
            "weekRange,projectId,name,category,expectedWork,status,completion,issues,notes"
        );
    }

    #[test]
    fn plain_weekly_reports_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let reports = random_reports(&mut rng);
            let text = encode_weekly_reports(&reports).unwrap();
            assert_eq!(decode_weekly_reports(&text), Some(reports));
        }
    }

    #[test]
    fn special_characters_are_quoted_and_restored() {
        let mut special = project("p-1", ProjectStatus::Completed);
        special.notes = Some("line1,\"quoted\", line2\nline3".to_string());
        let reports = vec![WeeklyReport {
            week_range: "7/7-7/13".to_string(),
            projects: vec![special],
        }];

        let text = encode_weekly_reports(&reports).unwrap();
        assert!(text.contains("\"line1,\"\"quoted\"\", line2\nline3\""));
        assert_eq!(decode_weekly_reports(&text), Some(reports));
    }

    fn awkward_text(rng: &mut StdRng) -> String {
        const PIECES: [&str; 8] = [",", "\"", "\n", "\r\n", "\"\"", "a", "季報", " "];
        let len = rng.gen_range(1..8);
        (0..len).map(|_| PIECES[rng.gen_range(0..PIECES.len())]).collect()
    }

    #[test]
    fn awkward_fields_are_quoted_doubled_and_restored() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut cases: Vec<String> = (0..500).map(|_| awkward_text(&mut rng)).collect();
        cases.extend(["\"\"\"".to_string(), "\n\n".to_string(), "\r\n".to_string(), ",".to_string()]);

        for notes in cases {
            let mut awkward = project("p-1", ProjectStatus::Pending);
            awkward.notes = Some(notes.clone());
            awkward.completion = notes.clone();
            let reports = vec![WeeklyReport {
                week_range: "7/7-7/13".to_string(),
                projects: vec![awkward],
            }];

            let text = encode_weekly_reports(&reports).unwrap();
            if notes.contains([',', '"', '\n', '\r']) {
                let quoted = format!("\"{}\"", notes.replace('"', "\"\""));
                assert!(text.contains(&quoted), "{notes:?} not quoted in {text:?}");
            }
            assert_eq!(decode_weekly_reports(&text), Some(reports), "{notes:?}");
        }
    }

    #[test]
    fn only_fields_needing_quotes_are_quoted() {
        let points = vec![LexiconPoint {
            week: "7/7-7/13".to_string(),
            total: 12000,
            added: 300,
        }];
        let text = encode_lexicon(&points).unwrap();
        assert_eq!(text, "\u{FEFF}week,total,new\n7/7-7/13,12000,300\n");
    }

    #[test]
    fn header_only_or_empty_text_is_no_data() {
        assert_eq!(decode_weekly_reports(""), None);
        assert_eq!(decode_lexicon("\u{FEFF}week,total,new\n"), None);
        assert_eq!(decode_knowledge_base("category,description,details\n\n\n"), None);
    }

    #[test]
    fn missing_trailing_fields_default() {
        let text = "weekRange,projectId,name,category,expectedWork,status,completion\n\
                    7/7-7/13,p-1,Importer,Tools,Bulk import,completed,Shipped\n";
        let reports = decode_weekly_reports(text).unwrap();
        let project = &reports[0].projects[0];
        assert_eq!(project.completion, "Shipped");
        assert_eq!(project.issues, None);
        assert_eq!(project.notes, None);
    }

    #[test]
    fn unparseable_counts_fall_back_to_zero() {
        let text = "week,total,new\n7/7-7/13,lots,12\n7/14-7/20,900\n";
        let points = decode_lexicon(text).unwrap();
        assert_eq!(points[0].total, 0);
        assert_eq!(points[0].added, 12);
        assert_eq!(points[1].total, 900);
        assert_eq!(points[1].added, 0);
    }

    #[test]
    fn rows_group_by_week_in_first_seen_order() {
        let text = "weekRange,projectId,name,category,expectedWork,status,completion,issues,notes\n\
                    7/14-7/20,a,A,c,w,completed,x,,\n\
                    7/7-7/13,b,B,c,w,進行中,x,,\n\
                    7/14-7/20,c,C,c,w,blocked,x,,\n\
                    ,d,D,c,w,pending,x,,\n";
        let reports = decode_weekly_reports(text).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].week_range, "7/14-7/20");
        assert_eq!(reports[0].projects.len(), 2);
        assert_eq!(reports[0].projects[1].status, ProjectStatus::Pending);
        assert_eq!(reports[1].projects[0].status, ProjectStatus::InProgress);
    }

    #[traced_test]
    #[test]
    fn unknown_status_warns_once() {
        let text = "weekRange,projectId,name,category,expectedWork,status,completion\n\
                    7/7-7/13,p-1,A,c,w,blocked,x\n";
        let reports = decode_weekly_reports(text).unwrap();
        assert_eq!(reports[0].projects[0].status, ProjectStatus::Pending);

        assert!(!logs_contain("validation"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("unknown status")).count() {
                1 => Ok(()),
                seen => Err(format!("expected one warning, saw {seen}")),
            }
        });
    }

    #[test]
    fn blank_project_id_gets_generated() {
        let text = "weekRange,projectId,name,category,expectedWork,status,completion\n\
                    7/7-7/13,,A,c,w,completed,x\n";
        let reports = decode_weekly_reports(text).unwrap();
        assert!(!reports[0].projects[0].id.is_empty());
    }

    #[test]
    fn quoted_comma_survives_decode() {
        let text = "category,description,details\nBilling,\"Invoices, refunds\",\n";
        let rows = decode_knowledge_base(text).unwrap();
        assert_eq!(rows[0].description, "Invoices, refunds");
        assert_eq!(rows[0].details, None);
    }

    #[test]
    fn rows_without_key_column_are_no_data() {
        let text = "category,description,details\n,orphan description,\n";
        assert_eq!(decode_knowledge_base(text), None);
    }

    #[test]
    fn knowledge_details_keep_their_shape() {
        let rows = vec![
            KnowledgeCategory {
                category: "Onboarding".to_string(),
                description: "First week".to_string(),
                details: Some(Details::List(vec![
                    "Accounts".to_string(),
                    "Workstation, desk".to_string(),
                ])),
            },
            KnowledgeCategory {
                category: "Billing".to_string(),
                description: "Invoices".to_string(),
                details: Some(Details::Single("Refund policy".to_string())),
            },
            KnowledgeCategory {
                category: "Misc".to_string(),
                description: "Other".to_string(),
                details: None,
            },
        ];
        let text = encode_knowledge_base(&rows).unwrap();
        assert_eq!(decode_knowledge_base(&text), Some(rows));
    }

    #[test]
    fn every_details_shape_round_trips() {
        let shapes = vec![
            Some(Details::List(vec!["Accounts".to_string()])),
            Some(Details::List(Vec::new())),
            Some(Details::List(vec!["first".to_string(), String::new(), "third".to_string()])),
            Some(Details::List(vec!["two\nlines".to_string(), "plain".to_string()])),
            Some(Details::List(vec!["[\"a\",".to_string(), "\"b\"]".to_string()])),
            Some(Details::Single(String::new())),
            Some(Details::Single("line one\nline two".to_string())),
            Some(Details::Single("[\"looks\", \"like json\"]".to_string())),
            Some(Details::Single("\"quoted\"".to_string())),
            Some(Details::Single("null".to_string())),
        ];
        let rows: Vec<KnowledgeCategory> = shapes
            .into_iter()
            .enumerate()
            .map(|(n, details)| KnowledgeCategory {
                category: format!("c-{n}"),
                description: "d".to_string(),
                details,
            })
            .collect();

        let text = encode_knowledge_base(&rows).unwrap();
        assert_eq!(decode_knowledge_base(&text), Some(rows));
    }

    #[test]
    fn hand_typed_multiline_details_read_as_list() {
        let text = "category,description,details\nOnboarding,First week,\"Accounts\r\nDesk\"\n";
        let rows = decode_knowledge_base(text).unwrap();
        assert_eq!(
            rows[0].details,
            Some(Details::List(vec!["Accounts".to_string(), "Desk".to_string()]))
        );
    }

    #[test]
    fn lexicon_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let points: Vec<LexiconPoint> = (0..rng.gen_range(1..10))
                .map(|n| LexiconPoint {
                    week: format!("wk-{n}"),
                    total: rng.gen_range(0..50_000),
                    added: rng.gen_range(0..2_000),
                })
                .collect();
            let text = encode_lexicon(&points).unwrap();
            assert_eq!(decode_lexicon(&text), Some(points));
        }
    }
}
