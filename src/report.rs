use std::fmt::Write;

use crate::aggregate;
use crate::config::Calendar;
use crate::models::{Achievement, WeeklyReport};
use crate::overrides::MonthlyView;

fn write_achievements(output: &mut String, items: &[Achievement], empty: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }

    for item in items {
        let _ = writeln!(output, "- **{}**: {}", item.title, item.description);
        if let Some(details) = &item.details {
            for line in details.items() {
                let _ = writeln!(output, "  - {line}");
            }
        }
    }
}

pub fn build_report(view: &MonthlyView, reports: &[WeeklyReport], calendar: &Calendar) -> String {
    let mut output = String::new();
    let stats = view.stats;

    let _ = writeln!(output, "# Monthly Summary {}", view.month);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Projects");
    let _ = writeln!(output, "- Total: {}", stats.total);
    let _ = writeln!(output, "- Completed: {}", stats.completed);
    let _ = writeln!(output, "- In progress: {}", stats.in_progress);
    let _ = writeln!(output, "- Pending: {}", stats.pending);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Achievements");
    write_achievements(&mut output, &view.achievements, "No achievements recorded for this month.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Challenges");
    write_achievements(&mut output, &view.challenges, "No challenges recorded for this month.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Next Month Goals");
    if view.goals.is_empty() {
        let _ = writeln!(output, "No goals set.");
    } else {
        for goal in &view.goals {
            let _ = writeln!(output, "- {goal}");
        }
    }

    let in_month = aggregate::reports_in_month(&view.month, reports, calendar);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Detail");

    if in_month.is_empty() {
        let _ = writeln!(output, "No weekly reports for this month.");
    } else {
        for report in in_month {
            let _ = writeln!(output, "### {}", report.week_range);
            for project in &report.projects {
                let _ = writeln!(
                    output,
                    "- [{}] {} ({}): {}",
                    project.status, project.name, project.category, project.completion
                );
                if let Some(issues) = &project.issues {
                    let _ = writeln!(output, "  - Issues: {issues}");
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::state::WorkingSet;

    #[test]
    fn report_uses_resolved_values() {
        let config = DashboardConfig::builtin().unwrap();
        let mut state = WorkingSet::from_defaults(&config);
        state.set_goals_buffer(vec!["Ship the glossary".to_string()]);
        state.save_all_groups();

        let report = build_report(&state.view(), &state.weekly_reports, &config.calendar);
        assert!(report.starts_with("# Monthly Summary 2025-07"));
        assert!(report.contains("- Total: 5"));
        assert!(report.contains("- Ship the glossary"));
        assert!(report.contains("  - 1,200 new terms reviewed"));
        assert!(report.contains("### 7/21-7/27"));
        assert!(!report.contains("7/28-8/3"));
        assert!(report.contains("  - Issues: Waiting on owner sign-off"));
    }

    #[test]
    fn empty_month_renders_placeholders() {
        let view = MonthlyView {
            month: "2025-09".to_string(),
            stats: Default::default(),
            achievements: Vec::new(),
            challenges: Vec::new(),
            goals: Vec::new(),
        };
        let report = build_report(&view, &[], &Calendar::default());
        assert!(report.contains("No achievements recorded"));
        assert!(report.contains("No goals set."));
        assert!(report.contains("No weekly reports for this month."));
    }
}
