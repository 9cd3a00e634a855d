//! Periodic task record maintenance.
//!
//! Each sweep first fails `running` tasks whose worker has gone silent
//! (a crashed process never records an outcome), then deletes terminal
//! tasks older than the retention period.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use codevoice_db::store::{StoreError, TaskStore};
use codevoice_events::Notifier;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Error recorded on tasks abandoned by their worker.
pub const STALE_TASK_ERROR: &str = "worker stopped before the task finished";

/// Retention settings for one sweep.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub retention: chrono::Duration,
    pub stale_after: chrono::Duration,
}

impl RetentionPolicy {
    pub fn new(retention_hours: i64, stale_task_minutes: i64) -> Self {
        Self {
            retention: chrono::Duration::hours(retention_hours),
            stale_after: chrono::Duration::minutes(stale_task_minutes),
        }
    }
}

/// Result of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub failed_stale: usize,
    pub purged: u64,
}

/// Run one sweep.
pub async fn sweep_once(
    store: &dyn TaskStore,
    notifier: &Notifier,
    policy: RetentionPolicy,
) -> Result<SweepReport, StoreError> {
    let now = Utc::now();

    let stale = store
        .fail_stale(now - policy.stale_after, STALE_TASK_ERROR)
        .await?;
    for task in &stale {
        tracing::warn!(task_id = %task.id, "Failed stale running task");
        notifier.notify(&task.to_update()).await;
    }

    let purged = store.purge_terminal_before(now - policy.retention).await?;

    Ok(SweepReport {
        failed_stale: stale.len(),
        purged,
    })
}

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn TaskStore>,
    notifier: Notifier,
    policy: RetentionPolicy,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_hours = policy.retention.num_hours(),
        stale_after_minutes = policy.stale_after.num_minutes(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Task retention job started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Task retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(store.as_ref(), &notifier, policy).await {
                    Ok(report) if report.failed_stale > 0 || report.purged > 0 => {
                        tracing::info!(
                            failed_stale = report.failed_stale,
                            purged = report.purged,
                            "Task retention: sweep complete",
                        );
                    }
                    Ok(_) => tracing::debug!("Task retention: nothing to do"),
                    Err(e) => tracing::error!(error = %e, "Task retention: sweep failed"),
                }
            }
        }
    }
}
