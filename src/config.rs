use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DashboardResult;
use crate::models::{KnowledgeCategory, LexiconPoint, MonthNarrative, WeeklyReport};

const BUILTIN_CONFIG: &str = include_str!("../seed/dashboard.json");

fn default_autosave_interval_secs() -> u64 {
    30
}

fn default_active_tab() -> String {
    "monthly".to_string()
}

/// Month id (`2025-07`) to the ordered week ranges that belong to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Calendar {
    months: BTreeMap<String, Vec<String>>,
}

impl Calendar {
    #[cfg(test)]
    pub fn new(months: BTreeMap<String, Vec<String>>) -> Self {
        Self { months }
    }

    pub fn weeks_for(&self, month: &str) -> &[String] {
        self.months.get(month).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn month_of(&self, week_range: &str) -> Option<&str> {
        self.months
            .iter()
            .find(|(_, weeks)| weeks.iter().any(|week| week == week_range))
            .map(|(month, _)| month.as_str())
    }

    pub fn contains_month(&self, month: &str) -> bool {
        self.months.contains_key(month)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default)]
    pub weekly_reports: Vec<WeeklyReport>,
    #[serde(default)]
    pub voice_to_text: Vec<LexiconPoint>,
    #[serde(default)]
    pub knowledge_base: Vec<KnowledgeCategory>,
    pub selected_month: String,
    #[serde(default)]
    pub selected_week: String,
    #[serde(default = "default_active_tab")]
    pub active_tab: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
    pub calendar: Calendar,
    #[serde(default)]
    pub narratives: BTreeMap<String, MonthNarrative>,
    pub defaults: Defaults,
}

impl DashboardConfig {
    pub fn builtin() -> DashboardResult<Self> {
        Ok(serde_json::from_str(BUILTIN_CONFIG)?)
    }

    pub fn from_path(path: &Path) -> DashboardResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn load(path: Option<&Path>) -> DashboardResult<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }

    /// Curated narrative for a month; months without one get empty sections.
    pub fn narrative_for(&self, month: &str) -> MonthNarrative {
        self.narratives.get(month).cloned().unwrap_or_default()
    }
}
