//! A publisher that discards every event, for tests and tools that don't
//! care about the WebSocket fan-out seam.

use async_trait::async_trait;

use crate::ports::EventPublisher;
use crate::types::OutboundEvent;

/// Discards every published event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: OutboundEvent) {}
}
