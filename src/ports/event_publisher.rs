//! Event publishing port.
//!
//! Implementations must publish only after the ingestion effect that
//! produced the event has committed (see the concurrency model's ordering
//! guarantees) — never from inside the block-write transaction.

use async_trait::async_trait;

use crate::types::OutboundEvent;

/// Port for publishing [`OutboundEvent`]s to whatever downstream fan-out
/// exists (external to this system; see module docs on [`crate::events`]).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Implementations should not block the caller on
    /// slow subscribers; a bounded channel with drop-oldest semantics is an
    /// acceptable trade-off since events are advisory (clients re-fetch
    /// state rather than trust the event payload alone).
    async fn publish(&self, event: OutboundEvent);
}
