//! Per-task status relay.
//!
//! Streams a task's status to one subscriber until the task reaches a
//! terminal state. With a broker, broker messages are forwarded verbatim
//! after an initial snapshot read from the store, and the store is still
//! re-read on the poll interval in case a terminal message is lost. Without
//! a broker, or when the broker fails, the store is polled and every status
//! change is forwarded.

use std::sync::Arc;
use std::time::Duration;

use codevoice_core::generation::TaskStatus;
use codevoice_core::task_events::{is_terminal_message, not_found_message};
use codevoice_core::types::TaskId;
use codevoice_db::store::TaskStore;
use codevoice_events::{TaskBroker, TaskSubscription};
use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A terminal status was forwarded.
    Terminal,
    /// The task record no longer exists.
    NotFound,
    /// The subscriber went away.
    Disconnected,
}

/// Relays one task's updates to a subscriber.
pub struct TaskRelay {
    store: Arc<dyn TaskStore>,
    broker: Option<Arc<dyn TaskBroker>>,
    poll_interval: Duration,
}

impl TaskRelay {
    pub fn new(
        store: Arc<dyn TaskStore>,
        broker: Option<Arc<dyn TaskBroker>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            broker,
            poll_interval,
        }
    }

    /// Run until the task is terminal, missing, or `emit` returns `false`.
    ///
    /// `emit` receives each JSON message for the subscriber and reports
    /// whether it was delivered.
    pub async fn run<F>(&self, task_id: TaskId, mut emit: F) -> RelayOutcome
    where
        F: FnMut(String) -> bool + Send,
    {
        let mut last_status = None;

        if let Some(broker) = &self.broker {
            match broker.subscribe(task_id).await {
                Ok(subscription) => {
                    if let Some(outcome) = self
                        .forward_broker(task_id, subscription, &mut emit, &mut last_status)
                        .await
                    {
                        return outcome;
                    }
                    tracing::warn!(
                        %task_id,
                        broker = broker.name(),
                        "Broker subscription ended early, polling the store",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        %task_id,
                        broker = broker.name(),
                        error = %e,
                        "Broker subscribe failed, polling the store",
                    );
                }
            }
        }

        self.poll(task_id, &mut emit, last_status).await
    }

    /// Snapshot then forward broker messages.
    ///
    /// Returns `None` when the relay should fall back to polling.
    async fn forward_broker<F>(
        &self,
        task_id: TaskId,
        mut subscription: TaskSubscription,
        emit: &mut F,
        last_status: &mut Option<TaskStatus>,
    ) -> Option<RelayOutcome>
    where
        F: FnMut(String) -> bool + Send,
    {
        // Read after subscribing so a task finishing in between is not missed.
        let snapshot = match self.store.find(task_id).await {
            Ok(Some(task)) => task.to_update(),
            Ok(None) => {
                emit(not_found_message(task_id));
                return Some(RelayOutcome::NotFound);
            }
            Err(e) => {
                tracing::warn!(%task_id, error = %e, "Snapshot read failed");
                return None;
            }
        };

        *last_status = Some(snapshot.status);
        if !emit(snapshot.to_json()) {
            return Some(RelayOutcome::Disconnected);
        }
        if snapshot.is_terminal() {
            return Some(RelayOutcome::Terminal);
        }

        // A lost terminal publish must not strand the subscriber, so the
        // store is re-read on the poll interval alongside the broker.
        let mut recheck = tokio::time::interval_at(
            Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                next = subscription.next() => {
                    let payload = next?;
                    if let Some(status) = message_status(&payload) {
                        *last_status = Some(status);
                    }
                    let terminal = is_terminal_message(&payload);
                    if !emit(payload) {
                        return Some(RelayOutcome::Disconnected);
                    }
                    if terminal {
                        return Some(RelayOutcome::Terminal);
                    }
                }
                _ = recheck.tick() => {
                    if let Some(outcome) = self.recheck_terminal(task_id, emit).await {
                        return Some(outcome);
                    }
                }
            }
        }
    }

    /// Forward the record if the store already shows it finished.
    async fn recheck_terminal<F>(&self, task_id: TaskId, emit: &mut F) -> Option<RelayOutcome>
    where
        F: FnMut(String) -> bool + Send,
    {
        match self.store.find(task_id).await {
            Ok(Some(task)) if task.status.is_terminal() => {
                tracing::debug!(%task_id, status = %task.status, "Terminal state read from store");
                if emit(task.to_update().to_json()) {
                    Some(RelayOutcome::Terminal)
                } else {
                    Some(RelayOutcome::Disconnected)
                }
            }
            Ok(Some(_)) => None,
            Ok(None) => {
                emit(not_found_message(task_id));
                Some(RelayOutcome::NotFound)
            }
            Err(e) => {
                tracing::warn!(%task_id, error = %e, "Relay re-read failed");
                None
            }
        }
    }

    /// Poll the store, forwarding each status change.
    async fn poll<F>(
        &self,
        task_id: TaskId,
        emit: &mut F,
        mut last_status: Option<TaskStatus>,
    ) -> RelayOutcome
    where
        F: FnMut(String) -> bool + Send,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let task = match self.store.find(task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    emit(not_found_message(task_id));
                    return RelayOutcome::NotFound;
                }
                Err(e) => {
                    tracing::warn!(%task_id, error = %e, "Relay poll failed, retrying");
                    continue;
                }
            };

            if last_status != Some(task.status) {
                last_status = Some(task.status);
                if !emit(task.to_update().to_json()) {
                    return RelayOutcome::Disconnected;
                }
            }
            if task.status.is_terminal() {
                return RelayOutcome::Terminal;
            }
        }
    }
}

/// The `status` field of a raw broker message, if it has a known one.
fn message_status(payload: &str) -> Option<TaskStatus> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value.get("status")?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_read_from_message() {
        assert_eq!(
            message_status(r#"{"task_id":"x","status":"running"}"#),
            Some(TaskStatus::Running)
        );
        assert_eq!(message_status(r#"{"status":"paused"}"#), None);
        assert_eq!(message_status("garbage"), None);
    }
}
