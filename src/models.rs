use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Completed,
    InProgress,
    Pending,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Completed => "completed",
            ProjectStatus::InProgress => "in-progress",
            ProjectStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = DashboardError;

    /// Accepts the wire tokens and the localized labels spreadsheet users type.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "completed" | "已完成" => Ok(ProjectStatus::Completed),
            "in-progress" | "進行中" => Ok(ProjectStatus::InProgress),
            "pending" | "待處理" => Ok(ProjectStatus::Pending),
            other => Err(DashboardError::validation(format!(
                "unknown project status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub category: String,
    pub expected_work: String,
    pub status: ProjectStatus,
    pub completion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub week_range: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Either a single paragraph or an itemized list. Stored data from before
/// the list form existed only ever holds the single-string shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Details {
    Single(String),
    List(Vec<String>),
}

impl Details {
    pub fn items(&self) -> Vec<&str> {
        match self {
            Details::Single(text) => vec![text.as_str()],
            Details::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    #[serde(rename = "totalProjects")]
    pub total: u32,
    #[serde(rename = "completedProjects")]
    pub completed: u32,
    #[serde(rename = "inProgressProjects")]
    pub in_progress: u32,
    #[serde(rename = "pendingProjects")]
    pub pending: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthNarrative {
    #[serde(default)]
    pub key_achievements: Vec<Achievement>,
    #[serde(default)]
    pub work_challenges: Vec<Achievement>,
    #[serde(default)]
    pub next_month_goals: Vec<String>,
}

/// Computed fields are written only by aggregation; the `manual_*` slots are
/// the only part the edit/save flow touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: String,
    #[serde(flatten)]
    pub stats: ProjectStats,
    #[serde(default)]
    pub key_achievements: Vec<Achievement>,
    #[serde(default)]
    pub work_challenges: Vec<Achievement>,
    #[serde(default)]
    pub next_month_goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_stats: Option<ProjectStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_achievements: Option<Vec<Achievement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_challenges: Option<Vec<Achievement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_goals: Option<Vec<String>>,
}

impl MonthlySummary {
    pub fn manual_slots(&self) -> ManualSlots {
        ManualSlots {
            stats: self.manual_stats,
            achievements: self.manual_achievements.clone(),
            challenges: self.manual_challenges.clone(),
            goals: self.manual_goals.clone(),
        }
    }

    pub fn set_manual_slots(&mut self, slots: ManualSlots) {
        self.manual_stats = slots.stats;
        self.manual_achievements = slots.achievements;
        self.manual_challenges = slots.challenges;
        self.manual_goals = slots.goals;
    }
}

/// The saved overrides of one month, kept apart from its computed summary so
/// they outlive switching to another month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProjectStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<Achievement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenges: Option<Vec<Achievement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<String>>,
}

impl ManualSlots {
    pub fn is_empty(&self) -> bool {
        self.stats.is_none()
            && self.achievements.is_none()
            && self.challenges.is_none()
            && self.goals.is_none()
    }
}

/// One week of the voice-to-text lexicon growth series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexiconPoint {
    pub week: String,
    pub total: u32,
    #[serde(rename = "new")]
    pub added: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeCategory {
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}
