use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::csv_codec;
use crate::error::DashboardResult;
use crate::models::{KnowledgeCategory, LexiconPoint, WeeklyReport};
use crate::state::WorkingSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    WeeklyReports,
    VoiceToText,
    KnowledgeBase,
}

impl ImportKind {
    pub const ALL: [ImportKind; 3] = [
        ImportKind::WeeklyReports,
        ImportKind::VoiceToText,
        ImportKind::KnowledgeBase,
    ];

    /// Infers the schema from a substring of the file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        if lowered.contains("週報") || lowered.contains("weekly") {
            Some(ImportKind::WeeklyReports)
        } else if lowered.contains("語音") || lowered.contains("voice") {
            Some(ImportKind::VoiceToText)
        } else if lowered.contains("知識庫") || lowered.contains("knowledge") {
            Some(ImportKind::KnowledgeBase)
        } else {
            None
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            ImportKind::WeeklyReports => "weekly-reports",
            ImportKind::VoiceToText => "voice-to-text",
            ImportKind::KnowledgeBase => "knowledge-base",
        }
    }

    pub fn export_file_name(self, date: NaiveDate) -> String {
        format!("{}_{}.csv", self.file_stem(), date.format("%Y-%m-%d"))
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportNotice {
    Imported {
        file: String,
        kind: ImportKind,
        rows: usize,
    },
    Failed {
        file: String,
        reason: String,
    },
}

impl fmt::Display for ImportNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportNotice::Imported { file, kind, rows } => {
                write!(f, "imported {rows} {kind} rows from {file}")
            }
            ImportNotice::Failed { file, reason } => write!(f, "failed to import {file}: {reason}"),
        }
    }
}

/// Decoded files waiting to be applied. A later file of the same kind
/// replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    pub weekly_reports: Option<Vec<WeeklyReport>>,
    pub voice_to_text: Option<Vec<LexiconPoint>>,
    pub knowledge_base: Option<Vec<KnowledgeCategory>>,
    pub notices: Vec<ImportNotice>,
}

impl ImportBatch {
    pub fn has_data(&self) -> bool {
        self.weekly_reports.is_some() || self.voice_to_text.is_some() || self.knowledge_base.is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ImportNotice> {
        self.notices
            .iter()
            .filter(|notice| matches!(notice, ImportNotice::Failed { .. }))
    }

    fn fail(&mut self, file: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(target: "dashboard::import", file, %reason, "import failed");
        self.notices.push(ImportNotice::Failed {
            file: file.to_string(),
            reason,
        });
    }

    /// Decodes one file's text into the batch. Unrecognized names are
    /// skipped without a notice.
    pub fn add_text(&mut self, file_name: &str, text: &str) {
        let Some(kind) = ImportKind::from_file_name(file_name) else {
            debug!(target: "dashboard::import", file = file_name, "no schema matches file name, skipped");
            return;
        };

        let rows = match kind {
            ImportKind::WeeklyReports => csv_codec::decode_weekly_reports(text).map(|reports| {
                let rows = reports.iter().map(|report| report.projects.len()).sum::<usize>();
                self.weekly_reports = Some(reports);
                rows
            }),
            ImportKind::VoiceToText => csv_codec::decode_lexicon(text).map(|points| {
                let rows = points.len();
                self.voice_to_text = Some(points);
                rows
            }),
            ImportKind::KnowledgeBase => csv_codec::decode_knowledge_base(text).map(|categories| {
                let rows = categories.len();
                self.knowledge_base = Some(categories);
                rows
            }),
        };

        match rows {
            Some(rows) => self.notices.push(ImportNotice::Imported {
                file: file_name.to_string(),
                kind,
                rows,
            }),
            None => self.fail(file_name, "no usable rows"),
        }
    }

    pub fn add_file(&mut self, path: &Path) {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if ImportKind::from_file_name(&file_name).is_none() {
            debug!(target: "dashboard::import", file = %file_name, "no schema matches file name, skipped");
            return;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => self.add_text(&file_name, &text),
            Err(err) => self.fail(&file_name, err.to_string()),
        }
    }

    pub fn from_files(paths: &[PathBuf]) -> Self {
        let mut batch = Self::default();
        for path in paths {
            batch.add_file(path);
        }
        batch
    }
}

/// Writes the three CSV exports into `out_dir`, named with `date`.
pub fn export_all(state: &WorkingSet, out_dir: &Path, date: NaiveDate) -> DashboardResult<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();

    for kind in ImportKind::ALL {
        let text = match kind {
            ImportKind::WeeklyReports => csv_codec::encode_weekly_reports(&state.weekly_reports)?,
            ImportKind::VoiceToText => csv_codec::encode_lexicon(&state.voice_to_text)?,
            ImportKind::KnowledgeBase => csv_codec::encode_knowledge_base(&state.knowledge_base)?,
        };
        let path = out_dir.join(kind.export_file_name(date));
        std::fs::write(&path, text)?;
        written.push(path);
    }

    info!(target: "dashboard::export", files = written.len(), dir = %out_dir.display(), "export written");
    Ok(written)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Backup<'a> {
    created_at: DateTime<Local>,
    #[serde(flatten)]
    state: &'a WorkingSet,
}

/// Saves the full working set as one JSON document before an import.
pub fn write_backup(state: &WorkingSet, out_dir: &Path, at: DateTime<Local>) -> DashboardResult<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("dashboard-backup_{}.json", at.format("%Y%m%d-%H%M%S")));
    let backup = Backup {
        created_at: at,
        state,
    };
    std::fs::write(&path, serde_json::to_string_pretty(&backup)?)?;
    info!(target: "dashboard::import", path = %path.display(), "backup written");
    Ok(path)
}
