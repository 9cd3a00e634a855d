//! The pub/sub broker seam.
//!
//! A broker delivers [`TaskUpdate`]s from the worker to relays subscribed
//! to a task's channel. Delivery is best effort: subscribers that miss a
//! message recover from the persisted record.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use codevoice_core::task_events::TaskUpdate;
use codevoice_core::types::TaskId;
use futures::stream::BoxStream;

/// Raw message payloads received on one task channel.
///
/// The stream ends when the broker connection is lost.
pub type TaskSubscription = BoxStream<'static, String>;

/// Errors raised by a [`TaskBroker`].
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Broker configuration error: {0}")]
    Config(String),
}

/// Task-scoped publish/subscribe.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &'static str;

    /// Publish a raw payload on the task's channel.
    async fn publish_raw(&self, task_id: TaskId, payload: &str) -> Result<(), BrokerError>;

    /// Subscribe to the task's channel.
    ///
    /// Messages published before this call returns are not delivered.
    async fn subscribe(&self, task_id: TaskId) -> Result<TaskSubscription, BrokerError>;

    /// Publish a status update as JSON.
    async fn publish(&self, update: &TaskUpdate) -> Result<(), BrokerError> {
        self.publish_raw(update.task_id, &update.to_json()).await
    }
}
