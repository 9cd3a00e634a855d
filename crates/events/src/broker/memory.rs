use std::sync::Arc;

use async_trait::async_trait;
use codevoice_core::task_events::{task_channel, DEFAULT_CHANNEL_PREFIX};
use codevoice_core::types::TaskId;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;

use super::{BrokerError, TaskBroker, TaskSubscription};
use crate::bus::EventBus;

/// [`TaskBroker`] over an in-process [`EventBus`].
///
/// Only reaches subscribers in the same process, so it suits single-node
/// deployments where the worker is embedded in the API server.
#[derive(Clone)]
pub struct InProcessBroker {
    bus: Arc<EventBus>,
    prefix: String,
}

impl InProcessBroker {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_bus(Arc::new(EventBus::default()), prefix)
    }

    pub fn with_bus(bus: Arc<EventBus>, prefix: impl Into<String>) -> Self {
        Self {
            bus,
            prefix: prefix.into(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_PREFIX)
    }
}

#[async_trait]
impl TaskBroker for InProcessBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish_raw(&self, task_id: TaskId, payload: &str) -> Result<(), BrokerError> {
        self.bus.publish(task_channel(&self.prefix, task_id), payload);
        Ok(())
    }

    async fn subscribe(&self, task_id: TaskId) -> Result<TaskSubscription, BrokerError> {
        let channel = task_channel(&self.prefix, task_id);
        let rx = self.bus.subscribe();

        let stream = futures::stream::unfold((rx, channel), |(mut rx, channel)| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) if msg.channel == channel => {
                        return Some((msg.payload, (rx, channel)));
                    }
                    Ok(_) => continue,
                    // Skipped messages may include this task's; end the
                    // stream so the subscriber re-reads the source of truth.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%channel, skipped, "In-process subscriber lagged, ending subscription");
                        return None;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use codevoice_core::task_events::TaskUpdate;

    use super::*;

    #[tokio::test]
    async fn subscriber_receives_only_its_task() {
        let broker = InProcessBroker::default();
        let mine = uuid::Uuid::new_v4();
        let other = uuid::Uuid::new_v4();

        let mut sub = broker.subscribe(mine).await.unwrap();

        broker.publish(&TaskUpdate::running(other)).await.unwrap();
        broker.publish(&TaskUpdate::running(mine)).await.unwrap();

        let payload = sub.next().await.unwrap();
        let update: TaskUpdate = serde_json::from_str(&payload).unwrap();
        assert_eq!(update.task_id, mine);
    }

    #[tokio::test]
    async fn raw_payloads_are_delivered_verbatim() {
        let broker = InProcessBroker::default();
        let id = uuid::Uuid::new_v4();
        let mut sub = broker.subscribe(id).await.unwrap();

        broker.publish_raw(id, r#"{"custom":true}"#).await.unwrap();
        assert_eq!(sub.next().await.unwrap(), r#"{"custom":true}"#);
    }

    #[tokio::test]
    async fn fan_out_to_many_subscribers() {
        let broker = InProcessBroker::default();
        let id = uuid::Uuid::new_v4();
        let mut a = broker.subscribe(id).await.unwrap();
        let mut b = broker.subscribe(id).await.unwrap();

        broker.publish(&TaskUpdate::failed(id, "timeout")).await.unwrap();

        assert_eq!(a.next().await, b.next().await);
    }

    #[tokio::test]
    async fn messages_before_subscribe_are_not_replayed() {
        let broker = InProcessBroker::default();
        let id = uuid::Uuid::new_v4();
        broker.publish(&TaskUpdate::queued(id)).await.unwrap();

        let mut sub = broker.subscribe(id).await.unwrap();
        broker.publish(&TaskUpdate::running(id)).await.unwrap();

        let update: TaskUpdate = serde_json::from_str(&sub.next().await.unwrap()).unwrap();
        assert_eq!(update, TaskUpdate::running(id));
    }

    #[tokio::test]
    async fn lagging_subscription_ends() {
        let broker = InProcessBroker::with_bus(Arc::new(EventBus::new(2)), DEFAULT_CHANNEL_PREFIX);
        let id = uuid::Uuid::new_v4();
        let mut sub = broker.subscribe(id).await.unwrap();

        broker.publish(&TaskUpdate::completed(id, serde_json::json!({}))).await.unwrap();
        for _ in 0..5 {
            broker.publish(&TaskUpdate::running(uuid::Uuid::new_v4())).await.unwrap();
        }

        assert_eq!(sub.next().await, None);
    }
}
