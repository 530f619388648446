//! Data persistence layer (adapters for store ports).
//!
//! This module provides the concrete implementation of the store ports
//! defined in [`crate::ports::store`], against `PostgreSQL`, plus the
//! in-memory block prefetch cache sitting in front of the node client.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Store Adapters                            │
//! │                                                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │                  PostgresStore                            │  │
//! │   │   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │  │
//! │   │   │   Blocks     │  │   Reorgs     │  │    Tasks     │   │  │
//! │   │   └──────────────┘  └──────────────┘  └──────────────┘   │  │
//! │   │   ┌──────────────┐  ┌──────────────┐                     │  │
//! │   │   │Kernels/Outputs│  │  Blockchains │                    │  │
//! │   │   │   /Inputs    │  │              │                    │  │
//! │   │   └──────────────┘  └──────────────┘                     │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! │                               │                                  │
//! │                               ▼                                  │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │              SQLx Connection Pool (PostgreSQL)            │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  BlockCache — per-node window cache in front of NodeClient       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mw_chain_indexer::store::PostgresStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/chain_indexer")
//!     .await?;
//!
//! let store = PostgresStore::new(pool);
//! store.run_migrations().await?;
//!
//! let blockchain = store.get_blockchain("mainnet").await?;
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via
//! [`PostgresStore::run_migrations`] or `sqlx migrate run`.

mod cache;
mod postgres;

pub use cache::BlockCache;
pub use postgres::PostgresStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;
