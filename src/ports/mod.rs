//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the domain layer needs.
//! Following hexagonal architecture, adapters (in the infrastructure layer)
//! implement these traits to provide concrete functionality.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Indexer Core                            │
//! │                                                                 │
//! │  Uses ports (traits) to define what it needs                   │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐            │
//! │  │    Store    │  │ NodeClient  │  │EventPublisher│            │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘            │
//! │         │                │                │                    │
//! └─────────┼────────────────┼────────────────┼────────────────────┘
//!           │                │                │
//!           ▼                ▼                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Infrastructure Layer                        │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐        │
//! │  │PostgresStore│  │ReqwestNode  │  │BroadcastPublisher │        │
//! │  │             │  │  Client     │  │                   │        │
//! │  └─────────────┘  └─────────────┘  └──────────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod event_publisher;
mod node_client;
mod store;

// Re-export all port traits
pub use event_publisher::EventPublisher;
pub use node_client::{NodeBlock, NodeClient, NodeHeader, NodeInput, NodeKernel, NodeOutput, Tip};
pub use store::{Store, StoreReadWrite, StoreTransaction};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ports_are_send_sync() {
        // Compile-time check that all port traits require Send + Sync.
        fn assert_send_sync<T: Send + Sync>() {}

        fn check_store<T: Store>() {
            assert_send_sync::<T>();
        }
        fn check_node_client<T: NodeClient>() {
            assert_send_sync::<T>();
        }
        fn check_event_publisher<T: EventPublisher>() {
            assert_send_sync::<T>();
        }
    }
}
