use crate::config::{Calendar, DashboardConfig};
use crate::models::{
    ManualSlots, MonthNarrative, MonthlySummary, Project, ProjectStats, ProjectStatus, WeeklyReport,
};

pub fn count_statuses<'a, I>(projects: I) -> ProjectStats
where
    I: IntoIterator<Item = &'a Project>,
{
    let mut stats = ProjectStats::default();
    for project in projects {
        stats.total += 1;
        match project.status {
            ProjectStatus::Completed => stats.completed += 1,
            ProjectStatus::InProgress => stats.in_progress += 1,
            ProjectStatus::Pending => stats.pending += 1,
        }
    }
    stats
}

pub fn reports_in_month<'a>(
    month: &str,
    reports: &'a [WeeklyReport],
    calendar: &Calendar,
) -> Vec<&'a WeeklyReport> {
    let weeks = calendar.weeks_for(month);
    reports
        .iter()
        .filter(|report| weeks.contains(&report.week_range))
        .collect()
}

/// Counts come from the month's projects; the narrative sections are authored
/// content passed in as-is.
pub fn compute_summary(
    month: &str,
    reports: &[WeeklyReport],
    calendar: &Calendar,
    narrative: MonthNarrative,
) -> MonthlySummary {
    let in_month = reports_in_month(month, reports, calendar);
    let stats = count_statuses(in_month.iter().flat_map(|report| report.projects.iter()));

    MonthlySummary {
        month: month.to_string(),
        stats,
        key_achievements: narrative.key_achievements,
        work_challenges: narrative.work_challenges,
        next_month_goals: narrative.next_month_goals,
        ..MonthlySummary::default()
    }
}

/// Recomputes the month and reattaches the overrides saved for it.
pub fn recompute(
    month: &str,
    reports: &[WeeklyReport],
    config: &DashboardConfig,
    saved: Option<&ManualSlots>,
) -> MonthlySummary {
    let mut summary = compute_summary(month, reports, &config.calendar, config.narrative_for(month));
    if let Some(saved) = saved {
        summary.set_manual_slots(saved.clone());
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::Achievement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn project(id: &str, status: ProjectStatus) -> Project {
        Project {
            id: id.to_string(),
            name: id.to_string(),
            category: "Tools".to_string(),
            expected_work: String::new(),
            status,
            completion: String::new(),
            issues: None,
            notes: None,
        }
    }

    fn july_calendar() -> Calendar {
        let mut months = BTreeMap::new();
        months.insert(
            "2025-07".to_string(),
            vec!["7/7-7/13".to_string(), "7/14-7/20".to_string()],
        );
        months.insert("2025-08".to_string(), vec!["8/4-8/10".to_string()]);
        Calendar::new(months)
    }

    #[test]
    fn basic_month_counts() {
        let reports = vec![WeeklyReport {
            week_range: "7/7-7/13".to_string(),
            projects: vec![
                project("a", ProjectStatus::Completed),
                project("b", ProjectStatus::Completed),
                project("c", ProjectStatus::InProgress),
            ],
        }];

        let summary = compute_summary("2025-07", &reports, &july_calendar(), MonthNarrative::default());
        assert_eq!(
            summary.stats,
            ProjectStats {
                total: 3,
                completed: 2,
                in_progress: 1,
                pending: 0,
            }
        );
        assert_eq!(summary.month, "2025-07");
        assert!(summary.manual_stats.is_none());
    }

    #[test]
    fn weeks_outside_month_are_ignored() {
        let reports = vec![
            WeeklyReport {
                week_range: "7/14-7/20".to_string(),
                projects: vec![project("a", ProjectStatus::Pending)],
            },
            WeeklyReport {
                week_range: "8/4-8/10".to_string(),
                projects: vec![project("b", ProjectStatus::Completed)],
            },
        ];

        let summary = compute_summary("2025-08", &reports, &july_calendar(), MonthNarrative::default());
        assert_eq!(summary.stats.total, 1);
        assert_eq!(summary.stats.completed, 1);
    }

    #[test]
    fn counts_add_up_for_every_month() {
        let calendar = july_calendar();
        let weeks = ["7/7-7/13", "7/14-7/20", "8/4-8/10", "9/1-9/7"];
        let statuses = [
            ProjectStatus::Completed,
            ProjectStatus::InProgress,
            ProjectStatus::Pending,
        ];
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let mut reports = Vec::new();
            for week in weeks {
                if !rng.gen_bool(0.7) {
                    continue;
                }
                let count = rng.gen_range(0..8);
                let projects = (0..count)
                    .map(|n| project(&n.to_string(), statuses[rng.gen_range(0..3)]))
                    .collect();
                reports.push(WeeklyReport {
                    week_range: week.to_string(),
                    projects,
                });
            }

            for month in ["2025-07", "2025-08", "2025-12"] {
                let stats = compute_summary(month, &reports, &calendar, MonthNarrative::default()).stats;
                assert_eq!(stats.total, stats.completed + stats.in_progress + stats.pending);
            }
        }
    }

    #[test]
    fn month_without_weeks_is_all_zero() {
        let reports = vec![WeeklyReport {
            week_range: "7/7-7/13".to_string(),
            projects: vec![project("a", ProjectStatus::Completed)],
        }];
        let summary = compute_summary("2031-01", &reports, &july_calendar(), MonthNarrative::default());
        assert_eq!(summary.stats, ProjectStats::default());
    }

    #[test]
    fn narrative_is_copied_verbatim() {
        let narrative = MonthNarrative {
            key_achievements: vec![Achievement {
                title: "Rollout".to_string(),
                description: "Shipped".to_string(),
                details: None,
            }],
            work_challenges: Vec::new(),
            next_month_goals: vec!["Automate review".to_string()],
        };
        let summary = compute_summary("2025-07", &[], &july_calendar(), narrative.clone());
        assert_eq!(summary.key_achievements, narrative.key_achievements);
        assert_eq!(summary.next_month_goals, narrative.next_month_goals);
    }

    #[test]
    fn recompute_attaches_saved_slots() {
        let config = DashboardConfig {
            calendar: july_calendar(),
            ..DashboardConfig::builtin().unwrap()
        };
        let saved = ManualSlots {
            stats: Some(ProjectStats {
                total: 15,
                ..ProjectStats::default()
            }),
            goals: Some(vec!["Custom".to_string()]),
            ..ManualSlots::default()
        };

        let with_saved = recompute("2025-07", &[], &config, Some(&saved));
        assert_eq!(with_saved.manual_stats.map(|stats| stats.total), Some(15));
        assert_eq!(with_saved.manual_goals, Some(vec!["Custom".to_string()]));
        assert_eq!(with_saved.stats, ProjectStats::default());

        let bare = recompute("2025-08", &[], &config, None);
        assert!(bare.manual_slots().is_empty());
    }
}
