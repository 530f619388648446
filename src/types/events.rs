//! Outbound event shapes published after a committed ingestion effect.
//!
//! These mirror the WebSocket event table: the external fan-out to browsers
//! is out of scope for this system, but the shapes and the publish seam
//! ([`crate::ports::EventPublisher`]) are defined so such a fan-out has
//! something to subscribe to.

use serde::{Deserialize, Serialize};

use super::entities::IngestionTask;
use super::primitives::{BlockHash, Height, LoadProgress, Slug};

/// A payload emitted after a successful ingestion effect.
///
/// `PriceUpdate` and `BlockchainDeleted` are shaped here but never
/// constructed by this system, since price fetching and blockchain deletion
/// are out of scope; they exist so a downstream fan-out built against this
/// type does not need a second schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[non_exhaustive]
pub enum OutboundEvent {
    /// A new block was accepted onto the main chain with no divergence.
    NewBlock {
        /// The blockchain the block belongs to.
        blockchain: Slug,
        /// The new block's hash.
        hash: BlockHash,
        /// The new block's height.
        height: Height,
    },
    /// A reorg was detected and applied.
    ///
    /// Carries only the blockchain slug, matching the original interface —
    /// clients must re-fetch to observe the new tip (see design notes).
    Reorged {
        /// The blockchain the reorg occurred on.
        blockchain: Slug,
    },
    /// A blockchain's bootstrap load progress changed.
    BlockchainProgressChanged {
        /// The blockchain whose progress changed.
        blockchain: Slug,
        /// The new progress value.
        load_progress: LoadProgress,
    },
    /// An ingestion task's status changed.
    TaskStatusChanged {
        /// The task whose status changed.
        task: IngestionTask,
    },
    /// Price data was refreshed (never emitted; price fetching is out of scope).
    PriceUpdate {
        /// Blockchain slug the price applies to.
        blockchain: Slug,
        /// Price in BTC terms, as an exact decimal string.
        btc_value: String,
        /// Percent change, formatted to two decimal places.
        percent_change: String,
    },
    /// A blockchain was deleted (never emitted; deletion is out of scope).
    BlockchainDeleted {
        /// The deleted blockchain's slug.
        blockchain: Slug,
    },
}
