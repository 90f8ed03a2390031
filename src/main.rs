use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod autosave;
mod config;
mod csv_codec;
mod dashboard;
mod db;
mod error;
mod models;
mod overrides;
mod report;
mod state;
mod transfer;

use crate::autosave::Autosaver;
use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::db::SliceStore;
use crate::models::{Achievement, Details, KnowledgeCategory, LexiconPoint, ProjectStatus};
use crate::overrides::FieldGroup;
use crate::state::ProjectPatch;
use crate::transfer::ImportBatch;

#[derive(Parser)]
#[command(name = "weekly-report-dashboard")]
#[command(about = "Weekly project reports with monthly rollups and manual overrides", long_about = None)]
struct Cli {
    /// SQLite file holding the dashboard state
    #[arg(long, default_value = "dashboard.db")]
    db: PathBuf,
    /// JSON file replacing the built-in calendar, narratives and seed data
    #[arg(long)]
    config: Option<PathBuf>,
    /// Key namespace inside the state file
    #[arg(long, default_value = "dashboard")]
    namespace: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupArg {
    Stats,
    Achievements,
    Challenges,
    Goals,
    All,
}

impl GroupArg {
    fn group(self) -> Option<FieldGroup> {
        match self {
            GroupArg::Stats => Some(FieldGroup::Stats),
            GroupArg::Achievements => Some(FieldGroup::Achievements),
            GroupArg::Challenges => Some(FieldGroup::Challenges),
            GroupArg::Goals => Some(FieldGroup::Goals),
            GroupArg::All => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Completed,
    InProgress,
    Pending,
}

impl From<StatusArg> for ProjectStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Completed => ProjectStatus::Completed,
            StatusArg::InProgress => ProjectStatus::InProgress,
            StatusArg::Pending => ProjectStatus::Pending,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print or write the markdown summary of a month
    Summary {
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Change the selected month and recompute its summary
    SelectMonth { month: String },
    /// Recompute the selected month, dropping pending monthly edits
    Refresh,
    /// Change the selected week
    SelectWeek { week: String },
    /// Remember the active dashboard tab
    Tab { name: String },
    /// Edit a monthly field group; the edit stays pending until saved
    Edit {
        #[command(subcommand)]
        target: EditTarget,
    },
    /// Commit pending monthly edits as manual overrides
    Save { group: GroupArg },
    /// Discard pending monthly edits
    Cancel { group: GroupArg },
    /// Drop a saved manual override so the computed value shows again
    ClearOverride { group: GroupArg },
    /// Edit the projects of the selected week
    Week {
        #[command(subcommand)]
        action: WeekAction,
    },
    /// Set one week of the voice-to-text lexicon growth series
    Lexicon {
        week: String,
        total: u32,
        #[arg(value_name = "NEW")]
        added: u32,
    },
    /// Add or replace a knowledge base category
    Knowledge {
        category: String,
        description: String,
        /// Repeat for an itemized list
        #[arg(long = "detail")]
        details: Vec<String>,
    },
    /// Export all records as CSV files named with today's date
    Export {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Import CSV files; the schema is inferred from each file name
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = ".")]
        backup_dir: PathBuf,
    },
    /// Remove all stored state and start over from the defaults
    Reset,
    /// Keep a session open with periodic saves until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum EditTarget {
    Stats {
        #[arg(long)]
        total: Option<u32>,
        #[arg(long)]
        completed: Option<u32>,
        #[arg(long)]
        in_progress: Option<u32>,
        #[arg(long)]
        pending: Option<u32>,
    },
    /// Replace achievements with a JSON array read from a file
    Achievements { from: PathBuf },
    /// Replace challenges with a JSON array read from a file
    Challenges { from: PathBuf },
    Goals {
        #[arg(required = true)]
        goals: Vec<String>,
    },
}

#[derive(Subcommand)]
enum WeekAction {
    Begin,
    Update {
        id: String,
        #[arg(long)]
        status: Option<StatusArg>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        expected_work: Option<String>,
        #[arg(long)]
        completion: Option<String>,
        #[arg(long)]
        issues: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Add {
        name: String,
        category: String,
        expected_work: String,
    },
    Remove { id: String },
    Save,
    Cancel,
}

fn read_achievements(path: &Path) -> anyhow::Result<Vec<Achievement>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid achievements in {}", path.display()))
}

async fn run_watch(dashboard: Dashboard) -> anyhow::Result<()> {
    let every = dashboard.config().autosave_interval();
    let shared = dashboard.into_shared();
    let autosaver = Autosaver::spawn(shared, every);

    println!("Session open, saving every {}s. Press Ctrl-C to close.", every.as_secs());
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    autosaver.shutdown().await?;
    println!("State saved.");
    Ok(())
}

async fn run(command: Commands, mut dashboard: Dashboard) -> anyhow::Result<()> {
    match command {
        Commands::Summary { month, out } => {
            let mut preview = dashboard.state().clone();
            if let Some(month) = month {
                preview.select_month(&month, dashboard.config())?;
            }
            let report = report::build_report(
                &preview.view(),
                &preview.weekly_reports,
                &dashboard.config().calendar,
            );
            match out {
                Some(out) => {
                    std::fs::write(&out, report)?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::SelectMonth { month } => {
            dashboard.select_month(&month).await?;
            println!("Selected {month}.");
        }
        Commands::Refresh => {
            dashboard.refresh_summary().await?;
            let stats = dashboard.view().stats;
            println!(
                "{}: {} projects, {} completed, {} in progress, {} pending.",
                dashboard.state().selected_month,
                stats.total,
                stats.completed,
                stats.in_progress,
                stats.pending
            );
        }
        Commands::SelectWeek { week } => {
            dashboard.select_week(&week).await?;
            println!("Selected week {week} ({}).", dashboard.state().selected_month);
        }
        Commands::Tab { name } => {
            dashboard.set_active_tab(&name).await?;
        }
        Commands::Edit { target } => match target {
            EditTarget::Stats {
                total,
                completed,
                in_progress,
                pending,
            } => {
                let mut stats = dashboard.view().stats;
                stats.total = total.unwrap_or(stats.total);
                stats.completed = completed.unwrap_or(stats.completed);
                stats.in_progress = in_progress.unwrap_or(stats.in_progress);
                stats.pending = pending.unwrap_or(stats.pending);
                dashboard.edit_stats(stats).await?;
                println!("Pending stats edit; run `save stats` to keep it.");
            }
            EditTarget::Achievements { from } => {
                dashboard.edit_achievements(read_achievements(&from)?).await?;
                println!("Pending achievements edit; run `save achievements` to keep it.");
            }
            EditTarget::Challenges { from } => {
                dashboard.edit_challenges(read_achievements(&from)?).await?;
                println!("Pending challenges edit; run `save challenges` to keep it.");
            }
            EditTarget::Goals { goals } => {
                dashboard.edit_goals(goals).await?;
                println!("Pending goals edit; run `save goals` to keep it.");
            }
        },
        Commands::Save { group } => match group.group() {
            Some(group) => {
                if dashboard.save_group(group).await? {
                    println!("Saved {group} override.");
                } else {
                    println!("Nothing to save for {group}.");
                }
            }
            None => {
                let changed = dashboard.save_all_groups().await?;
                if changed.is_empty() {
                    println!("No changes to save.");
                }
                for group in changed {
                    println!("Saved {group} override.");
                }
            }
        },
        Commands::Cancel { group } => {
            match group.group() {
                Some(group) => dashboard.cancel_group(group).await?,
                None => dashboard.cancel_all_groups().await?,
            }
            println!("Pending edits discarded.");
        }
        Commands::ClearOverride { group } => {
            let groups = match group.group() {
                Some(group) => vec![group],
                None => FieldGroup::ALL.to_vec(),
            };
            for group in groups {
                dashboard.clear_override(group).await?;
            }
            println!("Overrides cleared.");
        }
        Commands::Week { action } => match action {
            WeekAction::Begin => {
                dashboard.begin_weekly_edit().await?;
                println!(
                    "Editing {} ({} projects).",
                    dashboard.state().selected_week,
                    dashboard.state().weekly_projects.len()
                );
            }
            WeekAction::Update {
                id,
                status,
                name,
                category,
                expected_work,
                completion,
                issues,
                notes,
            } => {
                let patch = ProjectPatch {
                    name,
                    category,
                    expected_work,
                    status: status.map(ProjectStatus::from),
                    completion,
                    issues,
                    notes,
                };
                dashboard.update_weekly_project(&id, patch).await?;
            }
            WeekAction::Add {
                name,
                category,
                expected_work,
            } => {
                let id = dashboard
                    .add_weekly_project(&name, &category, &expected_work)
                    .await?;
                println!("Added project {id}.");
            }
            WeekAction::Remove { id } => {
                dashboard.remove_weekly_project(&id).await?;
            }
            WeekAction::Save => {
                dashboard.save_weekly_edits().await?;
                let stats = dashboard.view().stats;
                println!(
                    "Week saved. {} now has {} projects ({} completed).",
                    dashboard.state().selected_month,
                    stats.total,
                    stats.completed
                );
            }
            WeekAction::Cancel => {
                dashboard.cancel_weekly_edits().await?;
            }
        },
        Commands::Lexicon { week, total, added } => {
            dashboard.set_voice_to_text_editing(true).await?;
            dashboard
                .upsert_lexicon_point(LexiconPoint { week, total, added })
                .await?;
            dashboard.set_voice_to_text_editing(false).await?;
        }
        Commands::Knowledge {
            category,
            description,
            mut details,
        } => {
            let details = match details.len() {
                0 => None,
                1 => details.pop().map(Details::Single),
                _ => Some(Details::List(details)),
            };
            dashboard.set_knowledge_base_editing(true).await?;
            dashboard
                .upsert_knowledge_category(KnowledgeCategory {
                    category,
                    description,
                    details,
                })
                .await?;
            dashboard.set_knowledge_base_editing(false).await?;
        }
        Commands::Export { out_dir } => {
            let written = transfer::export_all(dashboard.state(), &out_dir, Local::now().date_naive())?;
            for path in written {
                println!("Exported {}.", path.display());
            }
        }
        Commands::Import { files, backup_dir } => {
            let batch = ImportBatch::from_files(&files);
            if !batch.has_data() {
                for notice in &batch.notices {
                    println!("{notice}");
                }
                println!("Nothing to import.");
                return Ok(());
            }

            let backup = transfer::write_backup(dashboard.state(), &backup_dir, Local::now())?;
            println!("Backup written to {}.", backup.display());
            for notice in &batch.notices {
                println!("{notice}");
            }
            let failed = batch.failures().count();
            if failed > 0 {
                println!("{failed} file(s) could not be imported; their data is unchanged.");
            }
            dashboard.apply_import(batch).await?;
        }
        Commands::Reset => {
            dashboard.reset().await?;
            println!("Dashboard reset to defaults.");
        }
        Commands::Watch => return run_watch(dashboard).await,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(
        DashboardConfig::load(cli.config.as_deref()).context("failed to load dashboard config")?,
    );
    let store = SliceStore::open(&cli.db, &cli.namespace)
        .await
        .with_context(|| format!("failed to open state file {}", cli.db.display()))?;
    let dashboard = Dashboard::restore(config, store.clone()).await;

    let result = run(cli.command, dashboard).await;
    store.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_update_accepts_every_project_field() {
        let cli = Cli::try_parse_from([
            "weekly-report-dashboard",
            "week",
            "update",
            "p-101",
            "--category",
            "Operations",
            "--expected-work",
            "Migrate billing pages",
            "--status",
            "in-progress",
        ])
        .unwrap();

        match cli.command {
            Commands::Week {
                action:
                    WeekAction::Update {
                        id,
                        status,
                        category,
                        expected_work,
                        name,
                        ..
                    },
            } => {
                assert_eq!(id, "p-101");
                assert_eq!(category.as_deref(), Some("Operations"));
                assert_eq!(expected_work.as_deref(), Some("Migrate billing pages"));
                assert!(matches!(status, Some(StatusArg::InProgress)));
                assert!(name.is_none());
            }
            _ => panic!("expected week update"),
        }
    }
}
