//! The generation worker loop.
//!
//! Claims queued tasks from the store, runs them through the configured
//! [`Generator`] and records the outcome. Every status change is
//! published through the [`Notifier`]; publishing is best effort and never
//! changes a task's outcome.

use std::sync::Arc;
use std::time::Instant;

use codevoice_core::generation::GenerationRequest;
use codevoice_core::task_events::TaskUpdate;
use codevoice_db::models::generation_task::GenerationTask;
use codevoice_db::store::{StoreError, TaskStore};
use codevoice_events::Notifier;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::generator::{GenerationError, Generator};
use crate::metrics::Metrics;

/// Pause before retrying a failed terminal store write.
const STORE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(200);

/// Background generation worker.
///
/// Shared as `Arc<GenerationWorker>`; each claimed task runs on its own
/// Tokio task, bounded by `WorkerConfig::concurrency`.
pub struct GenerationWorker {
    store: Arc<dyn TaskStore>,
    generator: Arc<dyn Generator>,
    notifier: Notifier,
    config: WorkerConfig,
    wakeup: Arc<Notify>,
    metrics: Option<Arc<Metrics>>,
}

impl GenerationWorker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        generator: Arc<dyn Generator>,
        notifier: Notifier,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            generator,
            notifier,
            config,
            wakeup: Arc::new(Notify::new()),
            metrics: None,
        }
    }

    /// Count tasks and upstream calls in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Share an existing wakeup signal, e.g. the one the enqueuer fires.
    pub fn with_wakeup(mut self, wakeup: Arc<Notify>) -> Self {
        self.wakeup = wakeup;
        self
    }

    /// Signal that wakes the loop before the next poll tick.
    pub fn wakeup(&self) -> Arc<Notify> {
        Arc::clone(&self.wakeup)
    }

    /// Run until `cancel` fires, then wait for in-flight tasks to finish.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let mut in_flight = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            generator = self.generator.name(),
            store = self.store.backend(),
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Generation worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.wakeup.notified() => {}
            }

            self.dispatch(&permits, &mut in_flight).await;
            while in_flight.try_join_next().is_some() {}
        }

        let remaining = in_flight.len();
        tracing::info!(remaining, "Generation worker shutting down, draining in-flight tasks");
        while in_flight.join_next().await.is_some() {}
        tracing::info!("Generation worker stopped");
    }

    /// Claim queued tasks while execution permits are available.
    async fn dispatch(self: &Arc<Self>, permits: &Arc<Semaphore>, in_flight: &mut JoinSet<()>) {
        loop {
            let Ok(permit) = Arc::clone(permits).try_acquire_owned() else {
                return;
            };

            match self.store.claim_next().await {
                Ok(Some(task)) => {
                    let worker = Arc::clone(self);
                    in_flight.spawn(async move {
                        worker.execute(task).await;
                        drop(permit);
                        // A slot is free; look for more work right away.
                        worker.wakeup.notify_one();
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim generation task");
                    return;
                }
            }
        }
    }

    /// Claim and run a single task inline.
    ///
    /// Returns the final record, or `None` when nothing was queued.
    pub async fn process_next(&self) -> Result<Option<GenerationTask>, StoreError> {
        match self.store.claim_next().await? {
            Some(task) => Ok(self.execute(task).await),
            None => Ok(None),
        }
    }

    /// Run a claimed (`running`) task to a terminal state.
    async fn execute(&self, task: GenerationTask) -> Option<GenerationTask> {
        let task_id = task.id;
        let started = Instant::now();
        self.notifier.notify(&TaskUpdate::running(task_id)).await;

        let outcome = match GenerationRequest::from_value(&task.request) {
            Ok(request) => {
                tracing::info!(
                    %task_id,
                    kind = request.kind.as_str(),
                    generator = self.generator.name(),
                    model = self.generator.model(),
                    "Generating",
                );
                let (provider, model) = (self.generator.name(), self.generator.model());
                if let Some(metrics) = &self.metrics {
                    metrics.ai_request(provider, model);
                }
                let outcome = self.generator.generate(&request).await;
                if let (Err(_), Some(metrics)) = (&outcome, &self.metrics) {
                    metrics.ai_error(provider, model);
                }
                outcome
            }
            Err(e) => Err(GenerationError::InvalidRequest(e.to_string())),
        };

        let stored = match outcome {
            Ok(result) => {
                match write_with_retry(|| self.store.complete(task_id, &result)).await {
                    // The result could not be stored; record why instead.
                    Err(StoreError::Database(e)) => {
                        tracing::error!(%task_id, error = %e, "Failed to store generation result");
                        let message = format!("Failed to store result: {e}");
                        write_with_retry(|| self.store.fail(task_id, &message)).await
                    }
                    other => other,
                }
            }
            Err(e) => {
                tracing::warn!(%task_id, error = %e, "Generation failed");
                let message = e.to_string();
                write_with_retry(|| self.store.fail(task_id, &message)).await
            }
        };

        match stored {
            Ok(finished) => {
                tracing::info!(
                    %task_id,
                    status = %finished.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generation task finished",
                );
                if let Some(metrics) = &self.metrics {
                    metrics.task(finished.status.as_str());
                }
                self.notifier.notify(&finished.to_update()).await;
                Some(finished)
            }
            Err(e) => {
                // Typically the retention sweep already failed a stale task.
                tracing::error!(%task_id, error = %e, "Failed to record generation outcome");
                None
            }
        }
    }
}

/// Run a terminal store write, retrying once on a database error.
///
/// State machine rejections are final: the task was already finished
/// elsewhere, usually by the stale sweep.
async fn write_with_retry<F, Fut>(write: F) -> Result<GenerationTask, StoreError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<GenerationTask, StoreError>>,
{
    match write().await {
        Err(StoreError::Database(e)) => {
            tracing::warn!(error = %e, "Store write failed, retrying once");
            tokio::time::sleep(STORE_RETRY_DELAY).await;
            write().await
        }
        other => other,
    }
}
