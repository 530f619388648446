//! In-process broadcast event publisher.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::ports::EventPublisher;
use crate::types::OutboundEvent;

/// Default channel capacity: enough to absorb a burst of reorg/new-block
/// events across all blockchains between subscriber polls.
const DEFAULT_CAPACITY: usize = 1024;

/// Publishes [`OutboundEvent`]s onto a `tokio::sync::broadcast` channel.
///
/// Slow or absent subscribers never block a publish: a lagging receiver
/// simply misses the oldest unread events (see [`broadcast::Receiver::recv`]
/// `Lagged` semantics), matching the "advisory, not authoritative" nature
/// of these events — clients re-fetch state rather than trust the event
/// payload alone.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<OutboundEvent>,
}

impl BroadcastPublisher {
    /// Create a new publisher with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new publisher with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the event stream. Each subscriber sees every event
    /// published after it subscribes, independent of other subscribers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: OutboundEvent) {
        match self.sender.send(event) {
            Ok(subscriber_count) => trace!(subscriber_count, "event published"),
            Err(_) => debug!("event published with no subscribers"),
        }
    }
}
