//! Domain types for the chain-state ingestion engine.
//!
//! - [`enums`] - Chain-data enumerations (`OutputType`, `KernelFeatures`, task kind/status)
//! - [`primitives`] - Validated newtypes (`BlockHash`, `Commitment`, `Height`, `LoadProgress`, ...)
//! - [`events`] - Outbound event shapes published after committed ingestion effects
//! - [`entities`] - Domain entities for database persistence

pub mod entities;
pub mod enums;
pub mod events;
pub mod primitives;

// Re-export commonly used types at module level
pub use entities::{Block, BlockHeader, Blockchain, IngestionTask, Input, Kernel, Node, Output, Reorg, TaskTarget};
pub use enums::{KernelFeatures, OutputType, TaskKind, TaskStatus};
pub use events::OutboundEvent;
pub use primitives::{BlockHash, Commitment, CuckooSolution, Height, LoadProgress, Slug};
