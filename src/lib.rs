//! Chain Indexer
//!
//! A chain-state ingestion engine for Mimblewimble-family blockchains: it
//! ingests blocks from one or more upstream full nodes, persists them into
//! a relational store, and maintains a consistent view of the canonical
//! chain plus its historical alternate branches (reorganizations) so a UI
//! can query chain tips, block details, and UTXO relationships.
//!
//! # Architecture
//!
//! The ingestion core follows a hexagonal architecture: [`ports`] defines
//! what the core needs, [`store`] and [`node`] provide concrete adapters,
//! and [`indexer`] holds the algorithm itself.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Indexer Core                             │
//! │                                                                   │
//! │   Bootstrap Loader ──┐                                           │
//! │                      ▼                                           │
//! │                Block Writer ──▶ Reorg Detector ──▶ Reorg Applier  │
//! │                      ▲                                           │
//! │   Live Ingress ──────┘                                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (enums, events, entities, primitives)
//! - [`error`] - Layered error types (node / domain / infra / app / API)
//! - [`config`] - Configuration loading and validation
//! - [`ports`] - Store, node client, and event publisher trait definitions
//! - [`store`] - Data persistence (`PostgreSQL`, block prefetch cache)
//! - [`node`] - Upstream node JSON-RPC client
//! - [`indexer`] - Core ingestion algorithm and per-blockchain job supervisor
//! - [`events`] - Outbound event publisher adapters
//! - [`api`] - Thin HTTP entry points driving the core
//! - [`metrics`] - Prometheus instrumentation
//!
//! # Getting Started
//!
//! ```bash
//! # Set up environment
//! cp .env.example .env
//! # Edit .env with your configuration
//!
//! # Run migrations
//! chain-indexer migrate
//!
//! # Start the service
//! chain-indexer run
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod indexer;
pub mod metrics;
pub mod node;
pub mod ports;
pub mod store;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
