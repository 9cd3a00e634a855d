//! Task status notifications.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TaskBroker`]: the pub/sub seam, with a Redis implementation
//!   ([`RedisBroker`]) and an in-process one ([`InProcessBroker`]).
//! - [`Notifier`]: best-effort publisher used by the enqueuer and worker.
//! - [`BrokerConfig`]: environment-driven broker selection.

pub mod broker;
pub mod bus;
pub mod config;
pub mod notifier;

pub use broker::memory::InProcessBroker;
pub use broker::redis::RedisBroker;
pub use broker::{BrokerError, TaskBroker, TaskSubscription};
pub use bus::{ChannelMessage, EventBus};
pub use config::{connect_broker, BrokerConfig, BrokerKind};
pub use notifier::Notifier;
