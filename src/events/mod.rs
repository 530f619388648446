//! Event publishing adapters.
//!
//! The external WebSocket fan-out to browsers is out of scope for this
//! system (§1); [`broadcast::BroadcastPublisher`] is the seam such a
//! fan-out would subscribe to, implemented as an in-process
//! `tokio::sync::broadcast` channel rather than the external message bus
//! the original system used, since that bus is itself out of scope.

mod broadcast;
mod noop;

pub use broadcast::BroadcastPublisher;
pub use noop::NoOpEventPublisher;
