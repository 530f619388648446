//! Chain-ingestion core: turns node block payloads into persisted, branch-
//! aware chain state, detects and repairs reorganizations, and schedules
//! the background work that keeps a blockchain's stored height caught up
//! with its upstream node.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          Indexer Core                             │
//! │                                                                   │
//! │   Bootstrap Loader ───┐                                          │
//! │                       ▼                                          │
//! │                 Block Writer ──▶ Reorg Detector ──▶ Reorg Applier │
//! │                       ▲                                          │
//! │   Live Ingress ───────┘                                          │
//! │                                                                   │
//! │   Supervisor: tracks one job per blockchain, cancels and awaits   │
//! │   the old one before a new bootstrap starts                      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write to chain state funnels through [`block_writer::write_block`]
//! inside one transaction; [`reorg_applier::apply_reorg`] is the only other
//! component allowed to mutate previously-written blocks, outputs, and
//! inputs, and it too runs as a single transaction.

pub mod block_writer;
pub mod bootstrap;
pub mod live_ingress;
pub mod progress;
pub mod reorg_applier;
pub mod reorg_detector;
pub mod supervisor;

pub use live_ingress::{ingest_live_block, LiveIngressOutcome};
pub use supervisor::Supervisor;
