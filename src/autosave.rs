use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dashboard::SharedDashboard;
use crate::error::DashboardResult;

/// Periodic safety-net writer. Rewrites every slice on each tick until it is
/// shut down, at which point it performs one final flush.
pub struct Autosaver {
    dashboard: SharedDashboard,
    ticker: JoinHandle<()>,
}

impl Autosaver {
    pub fn spawn(dashboard: SharedDashboard, every: Duration) -> Self {
        let shared = dashboard.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; restore just ran.
            interval.tick().await;

            loop {
                interval.tick().await;
                let guard = shared.lock().await;
                match guard.persist_all().await {
                    Ok(()) => debug!(target: "dashboard::autosave", "periodic save"),
                    Err(err) => warn!(target: "dashboard::autosave", error = %err, "periodic save failed"),
                }
            }
        });

        info!(target: "dashboard::autosave", every_secs = every.as_secs_f64(), "autosave started");
        Self { dashboard, ticker }
    }

    /// Pre-teardown trigger: stops the ticker and writes every slice once more.
    pub async fn shutdown(self) -> DashboardResult<()> {
        self.ticker.abort();
        let guard = self.dashboard.lock().await;
        guard.persist_all().await?;
        info!(target: "dashboard::autosave", "final save before teardown");
        Ok(())
    }
}
