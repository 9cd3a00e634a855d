//! Redis pub/sub broker.
//!
//! Publishing goes through a shared multiplexed connection. Each
//! subscription opens its own pub/sub connection, which is dropped with
//! the returned stream.

use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use codevoice_core::task_events::task_channel;
use codevoice_core::types::TaskId;
use futures::StreamExt;

use super::{BrokerError, TaskBroker, TaskSubscription};

/// [`TaskBroker`] backed by Redis `PUBLISH`/`SUBSCRIBE`.
#[derive(Clone, Debug)]
pub struct RedisBroker {
    client: ::redis::Client,
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisBroker {
    /// Open a client and establish the publishing connection.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, BrokerError> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            client,
            conn,
            prefix: prefix.into(),
        })
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn publish_raw(&self, task_id: TaskId, payload: &str) -> Result<(), BrokerError> {
        let channel = task_channel(&self.prefix, task_id);
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&channel, payload).await?;
        tracing::trace!(%channel, receivers, "Published task update");
        Ok(())
    }

    async fn subscribe(&self, task_id: TaskId) -> Result<TaskSubscription, BrokerError> {
        let channel = task_channel(&self.prefix, task_id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let stream = pubsub
            .into_on_message()
            .filter_map(move |msg| {
                let payload = match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        tracing::warn!(channel = %msg.get_channel_name(), error = %e, "Dropping non-text pub/sub payload");
                        None
                    }
                };
                async move { payload }
            });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let result = RedisBroker::connect("not-a-redis-url", "project_tasks").await;
        assert_matches!(result, Err(BrokerError::Redis(_)));
    }
}
