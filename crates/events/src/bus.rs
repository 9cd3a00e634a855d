//! In-process message bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries raw channel messages, the same shape Redis pub/sub
//! delivers, so the in-process broker and the Redis broker are
//! interchangeable for subscribers.

use tokio::sync::broadcast;

/// A message published on a named channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub channel: String,
    pub payload: String,
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// Every subscriber independently receives every published message and is
/// responsible for filtering the channels it cares about.
pub struct EventBus {
    sender: broadcast::Sender<ChannelMessage>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers, returning how many received it.
    ///
    /// With no subscribers the message is dropped and `0` is returned.
    pub fn publish(&self, channel: impl Into<String>, payload: impl Into<String>) -> usize {
        self.sender
            .send(ChannelMessage {
                channel: channel.into(),
                payload: payload.into(),
            })
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
