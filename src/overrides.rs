//! Picks the value shown for each monthly field group.
//!
//! Precedence, applied per group: a non-empty edit buffer, then the saved
//! manual slot, then the computed baseline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::models::{Achievement, MonthlySummary, ProjectStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldGroup {
    Stats,
    Achievements,
    Challenges,
    Goals,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 4] = [
        FieldGroup::Stats,
        FieldGroup::Achievements,
        FieldGroup::Challenges,
        FieldGroup::Goals,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldGroup::Stats => "stats",
            FieldGroup::Achievements => "achievements",
            FieldGroup::Challenges => "challenges",
            FieldGroup::Goals => "goals",
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldGroup {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FieldGroup::ALL
            .into_iter()
            .find(|group| group.as_str() == value)
            .ok_or_else(|| DashboardError::validation(format!("unknown field group `{value}`")))
    }
}

/// Whether an edit buffer counts as empty for resolution.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for ProjectStats {
    fn is_blank(&self) -> bool {
        false
    }
}

pub fn resolve<'a, T: Blank>(
    edit: Option<&'a T>,
    manual: Option<&'a T>,
    computed: Option<&'a T>,
) -> Option<&'a T> {
    edit.filter(|value| !value.is_blank())
        .or(manual)
        .or(computed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditBuffers {
    pub stats: Option<ProjectStats>,
    pub achievements: Vec<Achievement>,
    pub challenges: Vec<Achievement>,
    pub goals: Vec<String>,
}

/// What the dashboard displays for one month after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyView {
    pub month: String,
    pub stats: ProjectStats,
    pub achievements: Vec<Achievement>,
    pub challenges: Vec<Achievement>,
    pub goals: Vec<String>,
}

impl MonthlyView {
    pub fn resolve(summary: &MonthlySummary, buffers: &EditBuffers) -> Self {
        Self {
            month: summary.month.clone(),
            stats: *resolve(
                buffers.stats.as_ref(),
                summary.manual_stats.as_ref(),
                Some(&summary.stats),
            )
            .unwrap_or(&summary.stats),
            achievements: resolve(
                Some(&buffers.achievements),
                summary.manual_achievements.as_ref(),
                Some(&summary.key_achievements),
            )
            .cloned()
            .unwrap_or_default(),
            challenges: resolve(
                Some(&buffers.challenges),
                summary.manual_challenges.as_ref(),
                Some(&summary.work_challenges),
            )
            .cloned()
            .unwrap_or_default(),
            goals: resolve(
                Some(&buffers.goals),
                summary.manual_goals.as_ref(),
                Some(&summary.next_month_goals),
            )
            .cloned()
            .unwrap_or_default(),
        }
    }
}

/// Buffers seeded from what is authoritative without any live edit.
pub fn saved_buffers(summary: &MonthlySummary) -> EditBuffers {
    EditBuffers {
        stats: Some(summary.manual_stats.unwrap_or(summary.stats)),
        achievements: summary
            .manual_achievements
            .clone()
            .unwrap_or_else(|| summary.key_achievements.clone()),
        challenges: summary
            .manual_challenges
            .clone()
            .unwrap_or_else(|| summary.work_challenges.clone()),
        goals: summary
            .manual_goals
            .clone()
            .unwrap_or_else(|| summary.next_month_goals.clone()),
    }
}

/// Re-seeds one group's buffer from the saved view, leaving the others alone.
pub fn reseed_group(buffers: &mut EditBuffers, summary: &MonthlySummary, group: FieldGroup) {
    let saved = saved_buffers(summary);
    match group {
        FieldGroup::Stats => buffers.stats = saved.stats,
        FieldGroup::Achievements => buffers.achievements = saved.achievements,
        FieldGroup::Challenges => buffers.challenges = saved.challenges,
        FieldGroup::Goals => buffers.goals = saved.goals,
    }
}

/// Moves one group's buffer into its manual slot. Returns false when the
/// buffer is empty and nothing was committed.
pub fn commit_group(buffers: &EditBuffers, summary: &mut MonthlySummary, group: FieldGroup) -> bool {
    match group {
        FieldGroup::Stats => match buffers.stats {
            Some(stats) => summary.manual_stats = Some(stats),
            None => return false,
        },
        FieldGroup::Achievements => {
            if buffers.achievements.is_blank() {
                return false;
            }
            summary.manual_achievements = Some(buffers.achievements.clone());
        }
        FieldGroup::Challenges => {
            if buffers.challenges.is_blank() {
                return false;
            }
            summary.manual_challenges = Some(buffers.challenges.clone());
        }
        FieldGroup::Goals => {
            if buffers.goals.is_blank() {
                return false;
            }
            summary.manual_goals = Some(buffers.goals.clone());
        }
    }
    true
}

/// True when the buffer holds something other than the saved value.
pub fn group_differs(buffers: &EditBuffers, summary: &MonthlySummary, group: FieldGroup) -> bool {
    let saved = saved_buffers(summary);
    match group {
        FieldGroup::Stats => buffers.stats.is_some() && buffers.stats != saved.stats,
        FieldGroup::Achievements => {
            !buffers.achievements.is_blank() && buffers.achievements != saved.achievements
        }
        FieldGroup::Challenges => {
            !buffers.challenges.is_blank() && buffers.challenges != saved.challenges
        }
        FieldGroup::Goals => !buffers.goals.is_blank() && buffers.goals != saved.goals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total: u32) -> ProjectStats {
        ProjectStats {
            total,
            ..ProjectStats::default()
        }
    }

    fn summary_with_total(total: u32) -> MonthlySummary {
        MonthlySummary {
            month: "2025-07".to_string(),
            stats: stats(total),
            next_month_goals: vec!["computed goal".to_string()],
            ..MonthlySummary::default()
        }
    }

    #[test]
    fn precedence_over_all_presence_combinations() {
        let edit = vec!["edit".to_string()];
        let manual = vec!["manual".to_string()];
        let computed = vec!["computed".to_string()];

        for mask in 0..8u8 {
            let e = (mask & 0b100 != 0).then_some(&edit);
            let m = (mask & 0b010 != 0).then_some(&manual);
            let b = (mask & 0b001 != 0).then_some(&computed);

            let expected = if e.is_some() {
                Some(&edit)
            } else if m.is_some() {
                Some(&manual)
            } else if b.is_some() {
                Some(&computed)
            } else {
                None
            };
            assert_eq!(resolve(e, m, b), expected, "mask {mask:03b}");
        }
    }

    #[test]
    fn empty_edit_buffer_falls_through() {
        let edit: Vec<String> = Vec::new();
        let manual = vec!["manual".to_string()];
        let computed = vec!["computed".to_string()];
        assert_eq!(resolve(Some(&edit), Some(&manual), Some(&computed)), Some(&manual));
        assert_eq!(resolve(Some(&edit), None, Some(&computed)), Some(&computed));
    }

    #[test]
    fn saved_empty_manual_list_still_wins() {
        let manual: Vec<String> = Vec::new();
        let computed = vec!["computed".to_string()];
        assert_eq!(resolve(None, Some(&manual), Some(&computed)), Some(&manual));
    }

    #[test]
    fn groups_resolve_independently() {
        let mut summary = summary_with_total(10);
        summary.manual_goals = Some(vec!["manual goal".to_string()]);
        let buffers = EditBuffers {
            stats: Some(stats(15)),
            ..EditBuffers::default()
        };

        let view = MonthlyView::resolve(&summary, &buffers);
        assert_eq!(view.stats.total, 15);
        assert_eq!(view.goals, vec!["manual goal".to_string()]);
        assert!(view.achievements.is_empty());
    }

    #[test]
    fn commit_and_reseed_touch_one_group() {
        let mut summary = summary_with_total(10);
        let mut buffers = saved_buffers(&summary);
        buffers.stats = Some(stats(15));
        buffers.goals = vec!["edited goal".to_string()];

        assert!(commit_group(&buffers, &mut summary, FieldGroup::Stats));
        assert_eq!(summary.manual_stats, Some(stats(15)));
        assert!(summary.manual_goals.is_none());

        reseed_group(&mut buffers, &summary, FieldGroup::Goals);
        assert_eq!(buffers.goals, vec!["computed goal".to_string()]);
        assert_eq!(buffers.stats, Some(stats(15)));
    }

    #[test]
    fn empty_buffer_does_not_commit() {
        let mut summary = summary_with_total(10);
        let buffers = EditBuffers::default();
        for group in FieldGroup::ALL {
            assert!(!commit_group(&buffers, &mut summary, group));
        }
        assert_eq!(summary, summary_with_total(10));
    }

    #[test]
    fn differs_only_after_real_change() {
        let summary = summary_with_total(10);
        let mut buffers = saved_buffers(&summary);
        assert!(FieldGroup::ALL
            .iter()
            .all(|group| !group_differs(&buffers, &summary, *group)));

        buffers.stats = Some(stats(11));
        assert!(group_differs(&buffers, &summary, FieldGroup::Stats));
        assert!(!group_differs(&buffers, &summary, FieldGroup::Goals));
    }

    #[test]
    fn group_names_parse() {
        assert_eq!("goals".parse::<FieldGroup>().unwrap(), FieldGroup::Goals);
        assert!("everything".parse::<FieldGroup>().is_err());
    }
}
