use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::db::{Slice, SliceStore};
use crate::error::DashboardResult;
use crate::models::{
    Achievement, KnowledgeCategory, LexiconPoint, MonthlySummary, Project, ProjectStats,
};
use crate::overrides::{FieldGroup, MonthlyView};
use crate::state::{EditFlags, ProjectPatch, WorkingSet};
use crate::transfer::ImportBatch;

pub type SharedDashboard = Arc<Mutex<Dashboard>>;

const MONTHLY_SLICES: [Slice; 7] = [
    Slice::MonthlySummary,
    Slice::ManualOverrides,
    Slice::EditStats,
    Slice::EditAchievements,
    Slice::EditChallenges,
    Slice::EditGoals,
    Slice::IsEditing,
];

fn group_slice(group: FieldGroup) -> Slice {
    match group {
        FieldGroup::Stats => Slice::EditStats,
        FieldGroup::Achievements => Slice::EditAchievements,
        FieldGroup::Challenges => Slice::EditChallenges,
        FieldGroup::Goals => Slice::EditGoals,
    }
}

/// Encodes one slice of the working set the way it is kept in the store.
pub fn encode_slice(state: &WorkingSet, slice: Slice) -> DashboardResult<String> {
    let encoded = match slice {
        Slice::SelectedWeek => state.selected_week.clone(),
        Slice::SelectedMonth => state.selected_month.clone(),
        Slice::ActiveTab => state.active_tab.clone(),
        Slice::WeeklyReports => serde_json::to_string(&state.weekly_reports)?,
        Slice::VoiceToText => serde_json::to_string(&state.voice_to_text)?,
        Slice::KnowledgeBase => serde_json::to_string(&state.knowledge_base)?,
        Slice::MonthlySummary => serde_json::to_string(&state.monthly_summary)?,
        Slice::ManualOverrides => serde_json::to_string(&state.manual_overrides)?,
        Slice::EditStats => serde_json::to_string(&state.buffers.stats)?,
        Slice::EditAchievements => serde_json::to_string(&state.buffers.achievements)?,
        Slice::EditChallenges => serde_json::to_string(&state.buffers.challenges)?,
        Slice::EditGoals => serde_json::to_string(&state.buffers.goals)?,
        Slice::EditWeeklyProjects => serde_json::to_string(&state.weekly_projects)?,
        Slice::IsEditing => serde_json::to_string(&state.flags.monthly)?,
        Slice::IsWeeklyEditing => serde_json::to_string(&state.flags.weekly)?,
        Slice::IsVoiceToTextEditing => serde_json::to_string(&state.flags.voice_to_text)?,
        Slice::IsKnowledgeBaseEditing => serde_json::to_string(&state.flags.knowledge_base)?,
    };
    Ok(encoded)
}

/// The working set paired with its store. Every mutating call writes the
/// slices it touched before returning.
pub struct Dashboard {
    config: Arc<DashboardConfig>,
    store: SliceStore,
    state: WorkingSet,
}

impl Dashboard {
    /// Builds the working set from whatever the store holds, falling back to
    /// the configured defaults slice by slice.
    pub async fn restore(config: Arc<DashboardConfig>, store: SliceStore) -> Self {
        let mut state = WorkingSet::from_defaults(&config);
        let mut restored = 0usize;

        if let Some(reports) = store.load(Slice::WeeklyReports).await {
            state.weekly_reports = reports;
            restored += 1;
        }
        if let Some(points) = store.load(Slice::VoiceToText).await {
            state.voice_to_text = points;
            restored += 1;
        }
        if let Some(rows) = store.load(Slice::KnowledgeBase).await {
            state.knowledge_base = rows;
            restored += 1;
        }
        if let Some(month) = store
            .load_text(Slice::SelectedMonth)
            .await
            .filter(|month| config.calendar.contains_month(month))
        {
            state.selected_month = month;
            restored += 1;
        }
        if let Some(week) = store.load_text(Slice::SelectedWeek).await {
            state.selected_week = week;
        }
        if config.calendar.month_of(&state.selected_week) != Some(state.selected_month.as_str()) {
            if let Some(first_week) = config.calendar.weeks_for(&state.selected_month).first() {
                warn!(
                    target: "dashboard::restore",
                    week = %state.selected_week,
                    month = %state.selected_month,
                    "selected week is outside the selected month, using the month's first week"
                );
                state.selected_week = first_week.clone();
            }
        }
        if let Some(tab) = store.load_text(Slice::ActiveTab).await {
            state.active_tab = tab;
        }

        let flags = EditFlags {
            monthly: store.load(Slice::IsEditing).await.unwrap_or(false),
            weekly: store.load(Slice::IsWeeklyEditing).await.unwrap_or(false),
            voice_to_text: store.load(Slice::IsVoiceToTextEditing).await.unwrap_or(false),
            knowledge_base: store.load(Slice::IsKnowledgeBaseEditing).await.unwrap_or(false),
        };

        if let Some(saved) = store.load(Slice::ManualOverrides).await {
            state.manual_overrides = saved;
        }
        let stored_summary: Option<MonthlySummary> = store.load(Slice::MonthlySummary).await;
        state.monthly_summary = stored_summary.unwrap_or_default();
        state.refresh_summary(&config);
        state.flags = flags;

        if flags.monthly {
            if let Some(stats) = store.load::<Option<ProjectStats>>(Slice::EditStats).await {
                state.buffers.stats = stats;
            }
            if let Some(achievements) = store.load(Slice::EditAchievements).await {
                state.buffers.achievements = achievements;
            }
            if let Some(challenges) = store.load(Slice::EditChallenges).await {
                state.buffers.challenges = challenges;
            }
            if let Some(goals) = store.load(Slice::EditGoals).await {
                state.buffers.goals = goals;
            }
        }

        if flags.weekly {
            match store.load::<Vec<Project>>(Slice::EditWeeklyProjects).await {
                Some(projects) => state.weekly_projects = projects,
                None => state.begin_weekly_edit(),
            }
        }

        info!(
            target: "dashboard::restore",
            month = %state.selected_month,
            restored,
            editing = flags.monthly,
            "dashboard restored"
        );

        Self {
            config,
            store,
            state,
        }
    }

    pub fn into_shared(self) -> SharedDashboard {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &WorkingSet {
        &self.state
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn store(&self) -> &SliceStore {
        &self.store
    }

    pub fn view(&self) -> MonthlyView {
        self.state.view()
    }

    pub async fn save_slice(&self, slice: Slice) -> DashboardResult<()> {
        let encoded = encode_slice(&self.state, slice)?;
        self.store.write_raw(slice, &encoded).await
    }

    async fn save_slices(&self, slices: &[Slice]) -> DashboardResult<()> {
        let mut entries = Vec::with_capacity(slices.len());
        for slice in slices {
            entries.push((*slice, encode_slice(&self.state, *slice)?));
        }
        self.store.write_batch(&entries).await
    }

    /// Rewrites every slice. Used by the periodic and pre-teardown triggers.
    pub async fn persist_all(&self) -> DashboardResult<()> {
        self.save_slices(&Slice::ALL).await
    }

    pub async fn refresh_summary(&mut self) -> DashboardResult<()> {
        self.state.refresh_summary(&self.config);
        self.save_slices(&MONTHLY_SLICES).await
    }

    pub async fn select_month(&mut self, month: &str) -> DashboardResult<()> {
        self.state.select_month(month, &self.config)?;
        self.save_slices(&[Slice::SelectedMonth, Slice::SelectedWeek]).await?;
        self.save_slices(&MONTHLY_SLICES).await
    }

    pub async fn select_week(&mut self, week_range: &str) -> DashboardResult<()> {
        self.state.select_week(week_range, &self.config)?;
        self.save_slices(&[Slice::SelectedMonth, Slice::SelectedWeek]).await?;
        self.save_slices(&MONTHLY_SLICES).await
    }

    pub async fn set_active_tab(&mut self, tab: &str) -> DashboardResult<()> {
        self.state.active_tab = tab.to_string();
        self.save_slice(Slice::ActiveTab).await
    }

    pub async fn edit_stats(&mut self, stats: ProjectStats) -> DashboardResult<()> {
        self.state.set_stats_buffer(stats);
        self.save_slices(&[Slice::EditStats, Slice::IsEditing]).await
    }

    pub async fn edit_achievements(&mut self, achievements: Vec<Achievement>) -> DashboardResult<()> {
        self.state.set_achievements_buffer(achievements);
        self.save_slices(&[Slice::EditAchievements, Slice::IsEditing]).await
    }

    pub async fn edit_challenges(&mut self, challenges: Vec<Achievement>) -> DashboardResult<()> {
        self.state.set_challenges_buffer(challenges);
        self.save_slices(&[Slice::EditChallenges, Slice::IsEditing]).await
    }

    pub async fn edit_goals(&mut self, goals: Vec<String>) -> DashboardResult<()> {
        self.state.set_goals_buffer(goals);
        self.save_slices(&[Slice::EditGoals, Slice::IsEditing]).await
    }

    pub async fn save_group(&mut self, group: FieldGroup) -> DashboardResult<bool> {
        let committed = self.state.save_group(group);
        self.save_slices(&[Slice::MonthlySummary, Slice::ManualOverrides, group_slice(group)])
            .await?;
        Ok(committed)
    }

    pub async fn save_all_groups(&mut self) -> DashboardResult<Vec<FieldGroup>> {
        let changed = self.state.save_all_groups();
        self.save_slices(&MONTHLY_SLICES).await?;
        Ok(changed)
    }

    pub async fn cancel_group(&mut self, group: FieldGroup) -> DashboardResult<()> {
        self.state.cancel_group(group);
        self.save_slice(group_slice(group)).await
    }

    pub async fn cancel_all_groups(&mut self) -> DashboardResult<()> {
        self.state.cancel_all_groups();
        self.save_slices(&MONTHLY_SLICES).await
    }

    pub async fn clear_override(&mut self, group: FieldGroup) -> DashboardResult<()> {
        self.state.clear_override(group);
        self.save_slices(&[Slice::MonthlySummary, Slice::ManualOverrides, group_slice(group)])
            .await
    }

    pub async fn begin_weekly_edit(&mut self) -> DashboardResult<()> {
        self.state.begin_weekly_edit();
        self.save_slices(&[Slice::EditWeeklyProjects, Slice::IsWeeklyEditing]).await
    }

    pub async fn update_weekly_project(&mut self, id: &str, patch: ProjectPatch) -> DashboardResult<()> {
        self.state.update_weekly_project(id, patch)?;
        self.save_slice(Slice::EditWeeklyProjects).await
    }

    pub async fn add_weekly_project(
        &mut self,
        name: &str,
        category: &str,
        expected_work: &str,
    ) -> DashboardResult<String> {
        let id = self.state.add_weekly_project(name, category, expected_work)?;
        self.save_slice(Slice::EditWeeklyProjects).await?;
        Ok(id)
    }

    pub async fn remove_weekly_project(&mut self, id: &str) -> DashboardResult<()> {
        self.state.remove_weekly_project(id)?;
        self.save_slice(Slice::EditWeeklyProjects).await
    }

    pub async fn save_weekly_edits(&mut self) -> DashboardResult<()> {
        self.state.save_weekly_edits(&self.config)?;
        self.save_slices(&[
            Slice::WeeklyReports,
            Slice::EditWeeklyProjects,
            Slice::IsWeeklyEditing,
        ])
        .await?;
        self.save_slices(&MONTHLY_SLICES).await
    }

    pub async fn cancel_weekly_edits(&mut self) -> DashboardResult<()> {
        self.state.cancel_weekly_edits();
        self.save_slices(&[Slice::EditWeeklyProjects, Slice::IsWeeklyEditing]).await
    }

    pub async fn set_voice_to_text_editing(&mut self, editing: bool) -> DashboardResult<()> {
        self.state.set_voice_to_text_editing(editing);
        self.save_slice(Slice::IsVoiceToTextEditing).await
    }

    pub async fn upsert_lexicon_point(&mut self, point: LexiconPoint) -> DashboardResult<()> {
        self.state.upsert_lexicon_point(point)?;
        self.save_slice(Slice::VoiceToText).await
    }

    pub async fn set_knowledge_base_editing(&mut self, editing: bool) -> DashboardResult<()> {
        self.state.set_knowledge_base_editing(editing);
        self.save_slice(Slice::IsKnowledgeBaseEditing).await
    }

    pub async fn upsert_knowledge_category(&mut self, row: KnowledgeCategory) -> DashboardResult<()> {
        self.state.upsert_knowledge_category(row)?;
        self.save_slice(Slice::KnowledgeBase).await
    }

    /// Replaces each slice the batch carries data for, then recomputes.
    pub async fn apply_import(&mut self, batch: ImportBatch) -> DashboardResult<Vec<Slice>> {
        let mut touched = Vec::new();
        if let Some(reports) = batch.weekly_reports {
            self.state.weekly_reports = reports;
            self.state.cancel_weekly_edits();
            touched.extend([
                Slice::WeeklyReports,
                Slice::EditWeeklyProjects,
                Slice::IsWeeklyEditing,
            ]);
        }
        if let Some(points) = batch.voice_to_text {
            self.state.voice_to_text = points;
            touched.push(Slice::VoiceToText);
        }
        if let Some(rows) = batch.knowledge_base {
            self.state.knowledge_base = rows;
            touched.push(Slice::KnowledgeBase);
        }
        if touched.is_empty() {
            return Ok(touched);
        }

        self.state.refresh_summary(&self.config);
        touched.extend(MONTHLY_SLICES);
        self.save_slices(&touched).await?;
        info!(target: "dashboard::import", slices = touched.len(), "import applied");
        Ok(touched)
    }

    /// Wipes every stored key and goes back to the configured defaults.
    pub async fn reset(&mut self) -> DashboardResult<()> {
        self.store.clear().await?;
        self.state = WorkingSet::from_defaults(&self.config);
        info!(target: "dashboard::reset", namespace = %self.store.namespace(), "dashboard reset to defaults");
        Ok(())
    }
}
