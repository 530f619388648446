//! Domain entities for database persistence.
//!
//! These map directly onto the relational schema: each struct is one row
//! (or, for [`Blockchain`]/[`Node`]/[`IngestionTask`], one administrative
//! record) of the chain-state store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{KernelFeatures, OutputType, TaskKind, TaskStatus};
use super::primitives::{BlockHash, Commitment, CuckooSolution, Height, LoadProgress, Slug};

// ═══════════════════════════════════════════════════════════════════════════════
// NODE GROUP / NODE
// ═══════════════════════════════════════════════════════════════════════════════

/// A named grouping of nodes expected to be on the same network
/// (mainnet/testnet/localnet). Purely administrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroup {
    /// Primary key.
    pub id: Uuid,
    /// Human-readable name, e.g. "mainnet".
    pub name: String,
}

/// An upstream Mimblewimble-family full node a [`Blockchain`] is bound to.
///
/// A blockchain binds to exactly one node (no multi-node conflict
/// resolution, per Non-goals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Primary key.
    pub id: Uuid,
    /// Short identifier, also used as the prefetch cache key.
    pub slug: Slug,
    /// Display name.
    pub name: String,
    /// The group this node belongs to.
    pub group_id: Uuid,
    /// JSON-RPC base URL.
    pub api_url: String,
    /// HTTP Basic auth username.
    pub api_username: String,
    /// HTTP Basic auth password.
    pub api_password: String,
    /// Whether this node retains full history (drives bootstrap range and
    /// load-progress decimal precision).
    pub archive: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCKCHAIN
// ═══════════════════════════════════════════════════════════════════════════════

/// A named chain bound to exactly one [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blockchain {
    /// Primary key.
    pub id: Uuid,
    /// Unique, URL-safe identifier.
    pub slug: Slug,
    /// The node this blockchain ingests from.
    pub node_id: Uuid,
    /// Whether the bound node is an archive node.
    pub archive: bool,
    /// Bootstrap completion percentage, quantized per [`LoadProgress`].
    pub load_progress: LoadProgress,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK HEADER
// ═══════════════════════════════════════════════════════════════════════════════

/// A block header, deduplicated within a blockchain by its natural key:
/// `(blockchain_id, kernel_root, cuckoo_solution)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Primary key.
    pub id: Uuid,
    /// The blockchain this header belongs to.
    pub blockchain_id: Uuid,
    /// Header version as reported by the node.
    pub version: i32,
    /// Kernel MMR root (part of the natural key).
    pub kernel_root: String,
    /// Output MMR root.
    pub output_root: String,
    /// Range-proof MMR root.
    pub range_proof_root: String,
    /// Kernel MMR size.
    pub kernel_mmr_size: i64,
    /// Output MMR size.
    pub output_mmr_size: i64,
    /// Cuckoo-cycle proof-of-work solution (part of the natural key).
    pub cuckoo_solution: CuckooSolution,
    /// Proof-of-work nonce.
    pub nonce: i64,
    /// Cuckoo-cycle edge bits.
    pub edge_bits: i16,
    /// Secondary scaling factor.
    pub secondary_scaling: i64,
    /// Cumulative chain difficulty at this header.
    pub total_difficulty: i64,
    /// Cumulative kernel offset.
    pub total_kernel_offset: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// A block. Primary identity is its `hash`, globally unique.
///
/// `reorg_id = None` means this block is on the main chain; `Some(id)` means
/// it is on the demoted branch labeled by that [`Reorg`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Primary key; also the node-reported block hash.
    pub hash: BlockHash,
    /// The blockchain this block belongs to.
    pub blockchain_id: Uuid,
    /// The deduplicated header.
    pub header_id: Uuid,
    /// Height within the blockchain.
    pub height: Height,
    /// Timestamp the node reports for this block.
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous block, `None` only for genesis.
    pub prev_hash: Option<BlockHash>,
    /// Number of inputs in this block.
    pub input_count: i32,
    /// Number of outputs in this block.
    pub output_count: i32,
    /// Number of kernels in this block.
    pub kernel_count: i32,
    /// `None` iff this block is on the main chain.
    pub reorg_id: Option<Uuid>,
}

impl Block {
    /// Whether this block is on the main chain.
    #[must_use]
    pub const fn is_main_chain(&self) -> bool {
        self.reorg_id.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KERNEL
// ═══════════════════════════════════════════════════════════════════════════════

/// A transaction kernel, owned by exactly one [`Block`] (cascade delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    /// Primary key.
    pub id: Uuid,
    /// The block this kernel belongs to.
    pub block_hash: BlockHash,
    /// Feature flags.
    pub features: KernelFeatures,
    /// Fee paid, in the chain's base unit.
    pub fee: i64,
    /// Fee shift (fee-byte-shift encoding).
    pub fee_shift: i16,
    /// Lock height, 0 if unlocked.
    pub lock_height: i64,
    /// Pedersen commitment to the kernel excess.
    pub excess: Commitment,
    /// Aggregated Schnorr signature over the excess.
    pub excess_sig: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// A transaction or coinbase output, owned by exactly one [`Block`].
///
/// The same commitment may appear in two `Output` rows: one on the main
/// chain, one on a demoted branch — never twice on the same branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Primary key.
    pub id: Uuid,
    /// The block this output belongs to.
    pub block_hash: BlockHash,
    /// Whether this is a plain transaction output or a coinbase reward.
    pub output_type: OutputType,
    /// Pedersen value commitment. Not unique — see struct docs.
    pub commitment: Commitment,
    /// Whether a matching input has consumed this output on the same branch.
    pub spent: bool,
    /// Range proof bytes, hex-encoded.
    pub proof: String,
    /// Hash of the range proof.
    pub proof_hash: String,
    /// Merkle proof of inclusion; `None` for coinbase outputs.
    pub merkle_proof: Option<String>,
    /// Position in the output MMR at the time of inclusion.
    pub mmr_index: i64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// An input consuming a commitment, owned by exactly one [`Block`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Primary key.
    pub id: Uuid,
    /// The block this input belongs to.
    pub block_hash: BlockHash,
    /// The commitment being spent.
    pub commitment: Commitment,
    /// The [`Output`] this input resolves to, when known.
    ///
    /// Resolution prefers a same-branch output, then the main chain; it
    /// never links across two distinct demoted branches.
    pub output_id: Option<Uuid>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REORG
// ═══════════════════════════════════════════════════════════════════════════════

/// A record of a chain reorganization: a contiguous span of the former main
/// chain that has been demoted, plus the first block of the replacement.
///
/// `end_main_block` is deliberately not stored: the current tail of the new
/// main chain descending from `start_main_block` is always derivable by
/// walking forward, and storing it would require updating this row on every
/// subsequent block write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reorg {
    /// Primary key.
    pub id: Uuid,
    /// The blockchain this reorg occurred on.
    pub blockchain_id: Uuid,
    /// First demoted block, by height.
    pub start_reorg_block: BlockHash,
    /// Last demoted block, by height.
    pub end_reorg_block: BlockHash,
    /// The block that replaced `start_reorg_block` on the new main chain.
    pub start_main_block: BlockHash,
    /// When this reorg was recorded.
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INGESTION TASK
// ═══════════════════════════════════════════════════════════════════════════════

/// The persisted lifecycle record of a background ingestion job.
///
/// Modeled as a tagged variant over the known target-entity kinds rather
/// than a polymorphic foreign key (today there is only one kind; the enum
/// is written so adding a second is a non-breaking change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskTarget {
    /// The task targets a specific blockchain by slug.
    Blockchain(Slug),
}

/// A background job envelope: bootstrap or blockchain-delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionTask {
    /// Primary key.
    pub id: Uuid,
    /// What kind of job this is.
    pub kind: TaskKind,
    /// What entity the job targets.
    pub target: TaskTarget,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Populated when `status == Failure`.
    pub failure_reason: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task last changed status.
    pub updated_at: DateTime<Utc>,
}

impl IngestionTask {
    /// Create a new in-progress task.
    #[must_use]
    pub fn start(kind: TaskKind, target: TaskTarget, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target,
            status: TaskStatus::InProgress,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to `Success`.
    pub fn succeed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Success;
        self.failure_reason = None;
        self.updated_at = now;
    }

    /// Transition to `Failure` with the given reason.
    ///
    /// Used both for ordinary failures and for the two reserved reasons
    /// `"Worker shutdown"` and `"Aborted"`.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Failure;
        self.failure_reason = Some(reason.into());
        self.updated_at = now;
    }

    /// Transition to `Skipped`.
    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Skipped;
        self.failure_reason = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    #[test]
    fn block_main_chain_iff_no_reorg() {
        let block = Block {
            hash: BlockHash::new([1; 32]),
            blockchain_id: Uuid::nil(),
            header_id: Uuid::nil(),
            height: Height::new(10),
            timestamp: now(),
            prev_hash: None,
            input_count: 0,
            output_count: 0,
            kernel_count: 0,
            reorg_id: None,
        };
        assert!(block.is_main_chain());
    }

    #[test]
    fn task_lifecycle_worker_shutdown() {
        let mut task = IngestionTask::start(
            TaskKind::Bootstrap,
            TaskTarget::Blockchain(Slug::new("grin-main")),
            now(),
        );
        assert_eq!(task.status, TaskStatus::InProgress);
        task.fail("Worker shutdown", now());
        assert_eq!(task.status, TaskStatus::Failure);
        assert_eq!(task.failure_reason.as_deref(), Some("Worker shutdown"));
    }

    #[test]
    fn task_lifecycle_abort() {
        let mut task = IngestionTask::start(
            TaskKind::Bootstrap,
            TaskTarget::Blockchain(Slug::new("grin-main")),
            now(),
        );
        task.fail("Aborted", now());
        assert_eq!(task.failure_reason.as_deref(), Some("Aborted"));
    }
}
