use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::models::{
    Achievement, KnowledgeCategory, LexiconPoint, ManualSlots, MonthlySummary, Project,
    ProjectStats, ProjectStatus, WeeklyReport,
};
use crate::overrides::{self, EditBuffers, FieldGroup, MonthlyView};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditFlags {
    pub monthly: bool,
    pub weekly: bool,
    pub voice_to_text: bool,
    pub knowledge_base: bool,
}

/// Fields a weekly edit may change on a project; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub expected_work: Option<String>,
    pub status: Option<ProjectStatus>,
    pub completion: Option<String>,
    pub issues: Option<String>,
    pub notes: Option<String>,
}

impl ProjectPatch {
    fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(category) = self.category {
            project.category = category;
        }
        if let Some(expected_work) = self.expected_work {
            project.expected_work = expected_work;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(completion) = self.completion {
            project.completion = completion;
        }
        if let Some(issues) = self.issues {
            project.issues = Some(issues).filter(|value| !value.is_empty());
        }
        if let Some(notes) = self.notes {
            project.notes = Some(notes).filter(|value| !value.is_empty());
        }
    }
}

/// The whole in-memory dashboard state. Every mutation here is synchronous
/// and touches memory only; writing to the store is the controller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSet {
    pub weekly_reports: Vec<WeeklyReport>,
    pub voice_to_text: Vec<LexiconPoint>,
    pub knowledge_base: Vec<KnowledgeCategory>,
    pub monthly_summary: MonthlySummary,
    /// Saved overrides by month id; the selected month's entry mirrors the
    /// `manual_*` slots of `monthly_summary`.
    #[serde(default)]
    pub manual_overrides: BTreeMap<String, ManualSlots>,
    pub buffers: EditBuffers,
    pub weekly_projects: Vec<Project>,
    pub flags: EditFlags,
    pub selected_week: String,
    pub selected_month: String,
    pub active_tab: String,
}

impl WorkingSet {
    pub fn from_defaults(config: &DashboardConfig) -> Self {
        let defaults = &config.defaults;
        let mut set = Self {
            weekly_reports: defaults.weekly_reports.clone(),
            voice_to_text: defaults.voice_to_text.clone(),
            knowledge_base: defaults.knowledge_base.clone(),
            monthly_summary: MonthlySummary::default(),
            manual_overrides: BTreeMap::new(),
            buffers: EditBuffers::default(),
            weekly_projects: Vec::new(),
            flags: EditFlags::default(),
            selected_week: defaults.selected_week.clone(),
            selected_month: defaults.selected_month.clone(),
            active_tab: defaults.active_tab.clone(),
        };
        set.refresh_summary(config);
        set
    }

    pub fn view(&self) -> MonthlyView {
        MonthlyView::resolve(&self.monthly_summary, &self.buffers)
    }

    /// Recomputes the selected month and re-seeds every monthly buffer,
    /// dropping unsaved monthly edits.
    pub fn refresh_summary(&mut self, config: &DashboardConfig) {
        self.remember_manual_slots();
        self.monthly_summary = aggregate::recompute(
            &self.selected_month,
            &self.weekly_reports,
            config,
            self.manual_overrides.get(&self.selected_month),
        );
        self.buffers = overrides::saved_buffers(&self.monthly_summary);
        self.flags.monthly = false;
    }

    /// Copies the current summary's manual slots into the per-month map.
    fn remember_manual_slots(&mut self) {
        let month = &self.monthly_summary.month;
        if month.is_empty() {
            return;
        }
        let slots = self.monthly_summary.manual_slots();
        if slots.is_empty() {
            self.manual_overrides.remove(month);
        } else {
            self.manual_overrides.insert(month.clone(), slots);
        }
    }

    pub fn select_month(&mut self, month: &str, config: &DashboardConfig) -> DashboardResult<()> {
        if !config.calendar.contains_month(month) {
            return Err(DashboardError::not_found(format!("month {month}")));
        }
        if self.selected_month != month {
            self.selected_month = month.to_string();
            if let Some(first_week) = config.calendar.weeks_for(month).first() {
                self.selected_week = first_week.clone();
            }
        }
        self.refresh_summary(config);
        Ok(())
    }

    pub fn select_week(&mut self, week_range: &str, config: &DashboardConfig) -> DashboardResult<()> {
        let month = config
            .calendar
            .month_of(week_range)
            .ok_or_else(|| DashboardError::not_found(format!("week {week_range}")))?
            .to_string();
        self.selected_week = week_range.to_string();
        if month != self.selected_month {
            self.selected_month = month;
            self.refresh_summary(config);
        }
        Ok(())
    }

    pub fn begin_monthly_edit(&mut self) {
        if !self.flags.monthly {
            self.buffers = overrides::saved_buffers(&self.monthly_summary);
            self.flags.monthly = true;
        }
    }

    pub fn set_stats_buffer(&mut self, stats: ProjectStats) {
        self.begin_monthly_edit();
        self.buffers.stats = Some(stats);
    }

    pub fn set_achievements_buffer(&mut self, achievements: Vec<Achievement>) {
        self.begin_monthly_edit();
        self.buffers.achievements = achievements;
    }

    pub fn set_challenges_buffer(&mut self, challenges: Vec<Achievement>) {
        self.begin_monthly_edit();
        self.buffers.challenges = challenges;
    }

    pub fn set_goals_buffer(&mut self, goals: Vec<String>) {
        self.begin_monthly_edit();
        self.buffers.goals = goals;
    }

    /// Commits one group's buffer into its manual slot.
    pub fn save_group(&mut self, group: FieldGroup) -> bool {
        let committed = overrides::commit_group(&self.buffers, &mut self.monthly_summary, group);
        overrides::reseed_group(&mut self.buffers, &self.monthly_summary, group);
        self.remember_manual_slots();
        committed
    }

    /// Commits the groups whose buffers changed and leaves edit mode.
    pub fn save_all_groups(&mut self) -> Vec<FieldGroup> {
        let changed: Vec<FieldGroup> = FieldGroup::ALL
            .into_iter()
            .filter(|group| overrides::group_differs(&self.buffers, &self.monthly_summary, *group))
            .collect();
        for group in &changed {
            overrides::commit_group(&self.buffers, &mut self.monthly_summary, *group);
        }
        self.remember_manual_slots();
        self.buffers = overrides::saved_buffers(&self.monthly_summary);
        self.flags.monthly = false;
        changed
    }

    pub fn cancel_group(&mut self, group: FieldGroup) {
        overrides::reseed_group(&mut self.buffers, &self.monthly_summary, group);
    }

    pub fn cancel_all_groups(&mut self) {
        self.buffers = overrides::saved_buffers(&self.monthly_summary);
        self.flags.monthly = false;
    }

    /// Drops the saved manual slot so the group shows the computed value again.
    pub fn clear_override(&mut self, group: FieldGroup) {
        match group {
            FieldGroup::Stats => self.monthly_summary.manual_stats = None,
            FieldGroup::Achievements => self.monthly_summary.manual_achievements = None,
            FieldGroup::Challenges => self.monthly_summary.manual_challenges = None,
            FieldGroup::Goals => self.monthly_summary.manual_goals = None,
        }
        self.remember_manual_slots();
        overrides::reseed_group(&mut self.buffers, &self.monthly_summary, group);
    }

    pub fn selected_report(&self) -> Option<&WeeklyReport> {
        self.weekly_reports
            .iter()
            .find(|report| report.week_range == self.selected_week)
    }

    pub fn begin_weekly_edit(&mut self) {
        self.weekly_projects = self
            .selected_report()
            .map(|report| report.projects.clone())
            .unwrap_or_default();
        self.flags.weekly = true;
    }

    fn weekly_project_mut(&mut self, id: &str) -> DashboardResult<&mut Project> {
        if !self.flags.weekly {
            return Err(DashboardError::validation("weekly edit mode is not active"));
        }
        self.weekly_projects
            .iter_mut()
            .find(|project| project.id == id)
            .ok_or_else(|| DashboardError::not_found(format!("project {id}")))
    }

    pub fn update_weekly_project(&mut self, id: &str, patch: ProjectPatch) -> DashboardResult<()> {
        patch.apply(self.weekly_project_mut(id)?);
        Ok(())
    }

    pub fn add_weekly_project(
        &mut self,
        name: &str,
        category: &str,
        expected_work: &str,
    ) -> DashboardResult<String> {
        if !self.flags.weekly {
            return Err(DashboardError::validation("weekly edit mode is not active"));
        }
        let id = Uuid::new_v4().to_string();
        self.weekly_projects.push(Project {
            id: id.clone(),
            name: name.to_string(),
            category: category.to_string(),
            expected_work: expected_work.to_string(),
            status: ProjectStatus::Pending,
            completion: String::new(),
            issues: None,
            notes: None,
        });
        Ok(id)
    }

    pub fn remove_weekly_project(&mut self, id: &str) -> DashboardResult<()> {
        self.weekly_project_mut(id)?;
        self.weekly_projects.retain(|project| project.id != id);
        Ok(())
    }

    /// Writes the buffer back into the selected week's report and recomputes.
    pub fn save_weekly_edits(&mut self, config: &DashboardConfig) -> DashboardResult<()> {
        if !self.flags.weekly {
            return Err(DashboardError::validation("weekly edit mode is not active"));
        }
        let projects = std::mem::take(&mut self.weekly_projects);
        match self
            .weekly_reports
            .iter_mut()
            .find(|report| report.week_range == self.selected_week)
        {
            Some(report) => report.projects = projects,
            None => self.weekly_reports.push(WeeklyReport {
                week_range: self.selected_week.clone(),
                projects,
            }),
        }
        self.flags.weekly = false;
        self.refresh_summary(config);
        Ok(())
    }

    pub fn cancel_weekly_edits(&mut self) {
        self.weekly_projects.clear();
        self.flags.weekly = false;
    }

    pub fn set_voice_to_text_editing(&mut self, editing: bool) {
        self.flags.voice_to_text = editing;
    }

    pub fn set_knowledge_base_editing(&mut self, editing: bool) {
        self.flags.knowledge_base = editing;
    }

    /// Updates the point for `week`, appending it when the week is new.
    pub fn upsert_lexicon_point(&mut self, point: LexiconPoint) -> DashboardResult<()> {
        if !self.flags.voice_to_text {
            return Err(DashboardError::validation("voice-to-text edit mode is not active"));
        }
        match self.voice_to_text.iter_mut().find(|existing| existing.week == point.week) {
            Some(existing) => *existing = point,
            None => self.voice_to_text.push(point),
        }
        Ok(())
    }

    pub fn upsert_knowledge_category(&mut self, row: KnowledgeCategory) -> DashboardResult<()> {
        if !self.flags.knowledge_base {
            return Err(DashboardError::validation("knowledge base edit mode is not active"));
        }
        match self
            .knowledge_base
            .iter_mut()
            .find(|existing| existing.category == row.category)
        {
            Some(existing) => *existing = row,
            None => self.knowledge_base.push(row),
        }
        Ok(())
    }
}
