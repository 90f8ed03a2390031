use std::path::Path;

use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::DashboardResult;

const UPSERT_SLICE: &str = r#"
    INSERT INTO slices (namespace, key, value, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT (namespace, key) DO UPDATE
    SET value = excluded.value, updated_at = excluded.updated_at
"#;

/// One independently stored piece of dashboard state. Selections are kept
/// as bare strings, everything else as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    WeeklyReports,
    VoiceToText,
    KnowledgeBase,
    MonthlySummary,
    ManualOverrides,
    EditStats,
    EditAchievements,
    EditChallenges,
    EditGoals,
    EditWeeklyProjects,
    IsEditing,
    IsWeeklyEditing,
    IsVoiceToTextEditing,
    IsKnowledgeBaseEditing,
    SelectedWeek,
    SelectedMonth,
    ActiveTab,
}

impl Slice {
    pub const ALL: [Slice; 17] = [
        Slice::WeeklyReports,
        Slice::VoiceToText,
        Slice::KnowledgeBase,
        Slice::MonthlySummary,
        Slice::ManualOverrides,
        Slice::EditStats,
        Slice::EditAchievements,
        Slice::EditChallenges,
        Slice::EditGoals,
        Slice::EditWeeklyProjects,
        Slice::IsEditing,
        Slice::IsWeeklyEditing,
        Slice::IsVoiceToTextEditing,
        Slice::IsKnowledgeBaseEditing,
        Slice::SelectedWeek,
        Slice::SelectedMonth,
        Slice::ActiveTab,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Slice::WeeklyReports => "weeklyReports",
            Slice::VoiceToText => "voiceToTextData",
            Slice::KnowledgeBase => "knowledgeBaseData",
            Slice::MonthlySummary => "monthlySummary",
            Slice::ManualOverrides => "manualOverrides",
            Slice::EditStats => "editStats",
            Slice::EditAchievements => "editAchievements",
            Slice::EditChallenges => "editChallenges",
            Slice::EditGoals => "editGoals",
            Slice::EditWeeklyProjects => "editWeeklyProjects",
            Slice::IsEditing => "isEditing",
            Slice::IsWeeklyEditing => "isWeeklyEditing",
            Slice::IsVoiceToTextEditing => "isVoiceToTextEditing",
            Slice::IsKnowledgeBaseEditing => "isKnowledgeBaseEditing",
            Slice::SelectedWeek => "selectedWeek",
            Slice::SelectedMonth => "selectedMonth",
            Slice::ActiveTab => "activeTab",
        }
    }
}

/// Durable key/value storage for slices, scoped by namespace. Every write is
/// a full overwrite of one key; there is no merging.
#[derive(Debug, Clone)]
pub struct SliceStore {
    pool: SqlitePool,
    namespace: String,
}

impl SliceStore {
    pub async fn open(path: &Path, namespace: &str) -> DashboardResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        info!(target: "dashboard::db", path = %path.display(), namespace, "opened slice store");
        Self::init(pool, namespace).await
    }

    /// A private in-memory database; it lives as long as the single pooled
    /// connection does.
    #[cfg(test)]
    pub async fn in_memory(namespace: &str) -> DashboardResult<Self> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::init(pool, namespace).await
    }

    async fn init(pool: SqlitePool, namespace: &str) -> DashboardResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            namespace: namespace.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn write_raw(&self, slice: Slice, value: &str) -> DashboardResult<()> {
        sqlx::query(UPSERT_SLICE)
            .bind(&self.namespace)
            .bind(slice.key())
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        debug!(target: "dashboard::db", key = slice.key(), bytes = value.len(), "slice written");
        Ok(())
    }

    /// Writes several slices in one transaction.
    pub async fn write_batch(&self, entries: &[(Slice, String)]) -> DashboardResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for (slice, value) in entries {
            sqlx::query(UPSERT_SLICE)
                .bind(&self.namespace)
                .bind(slice.key())
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(target: "dashboard::db", slices = entries.len(), "slice batch written");
        Ok(())
    }

    pub async fn read_raw(&self, slice: Slice) -> DashboardResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM slices WHERE namespace = ?1 AND key = ?2")
            .bind(&self.namespace)
            .bind(slice.key())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Absent, unreadable and malformed values all come back as `None`.
    pub async fn load<T: DeserializeOwned>(&self, slice: Slice) -> Option<T> {
        let raw = match self.read_raw(slice).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(target: "dashboard::db", key = slice.key(), error = %err, "slice unreadable");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(target: "dashboard::db", key = slice.key(), error = %err, "malformed slice ignored");
                None
            }
        }
    }

    pub async fn load_text(&self, slice: Slice) -> Option<String> {
        match self.read_raw(slice).await {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "dashboard::db", key = slice.key(), error = %err, "slice unreadable");
                None
            }
        }
    }

    pub async fn clear(&self) -> DashboardResult<u64> {
        let result = sqlx::query("DELETE FROM slices WHERE namespace = ?1")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;
        info!(target: "dashboard::db", namespace = %self.namespace, removed = result.rows_affected(), "store cleared");
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
