//! Best-effort status publishing.

use std::sync::Arc;

use codevoice_core::task_events::TaskUpdate;

use crate::broker::TaskBroker;

/// Publishes task updates when a broker is configured.
///
/// Publishing never fails the caller: errors are logged at `warn` and
/// subscribers recover the state from the store.
#[derive(Clone, Default)]
pub struct Notifier {
    broker: Option<Arc<dyn TaskBroker>>,
}

impl Notifier {
    pub fn new(broker: Option<Arc<dyn TaskBroker>>) -> Self {
        Self { broker }
    }

    /// A notifier that drops every update.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn broker(&self) -> Option<&Arc<dyn TaskBroker>> {
        self.broker.as_ref()
    }

    /// Publish an update. Returns whether it reached the broker.
    pub async fn notify(&self, update: &TaskUpdate) -> bool {
        let Some(broker) = &self.broker else {
            return false;
        };

        match broker.publish(update).await {
            Ok(()) => {
                tracing::debug!(
                    task_id = %update.task_id,
                    status = %update.status,
                    broker = broker.name(),
                    "Published task update",
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    task_id = %update.task_id,
                    status = %update.status,
                    broker = broker.name(),
                    error = %e,
                    "Failed to publish task update",
                );
                false
            }
        }
    }
}
