//! Storage port traits for chain-state persistence.
//!
//! These traits define the contract the ingestion engine needs from its
//! relational store. Infrastructure adapters (currently only
//! [`crate::store::postgres::PostgresStore`]) implement them against a
//! concrete backend.
//!
//! # Transactional scope
//!
//! [`Store::begin`] opens a read-your-writes transactional scope. The only
//! strictly required transactional unit is the single-block write performed
//! by [`crate::indexer::block_writer`]; every other caller may use
//! auto-committing calls directly on [`Store`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::entities::{Block, BlockHeader, Blockchain, IngestionTask, Input, Kernel, Output, Reorg};
use crate::types::primitives::{BlockHash, Commitment, Height};

/// A transactional unit of work against the store.
///
/// All methods available on [`Store`] are also available on a transaction,
/// scoped to it; a transaction is committed or rolled back explicitly.
#[async_trait]
pub trait StoreTransaction: StoreReadWrite + Send {
    /// Commit the transaction, making its writes visible.
    ///
    /// # Errors
    /// Returns an error if the commit fails (e.g., constraint violation
    /// detected at commit time, connection lost).
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll back the transaction, discarding its writes.
    ///
    /// # Errors
    /// Returns an error if the rollback itself fails.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// The read/write operations shared by [`Store`] and [`StoreTransaction`].
#[async_trait]
pub trait StoreReadWrite: Send + Sync {
    /// Look up a blockchain by slug.
    async fn get_blockchain(&self, slug: &str) -> Result<Option<Blockchain>>;

    /// Persist a blockchain's updated load progress.
    async fn update_load_progress(&self, blockchain_id: Uuid, progress: &crate::types::LoadProgress) -> Result<()>;

    /// Look up a block by its hash, regardless of branch.
    async fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>>;

    /// Look up the main-chain block at a given height (`reorg_id IS NULL`).
    async fn get_main_chain_block_at(
        &self,
        blockchain_id: Uuid,
        height: Height,
    ) -> Result<Option<Block>>;

    /// List all main-chain blocks in `[from_height, ..]`, ascending by height.
    async fn list_main_chain_from(&self, blockchain_id: Uuid, from_height: Height) -> Result<Vec<Block>>;

    /// Find the block whose `prev_hash` equals `hash`, regardless of branch.
    ///
    /// Mirrors the upstream convention of locating a block's child by
    /// parent-hash lookup rather than height, which the Reorg Applier's
    /// label-flip walk depends on. If two branches share a fork point, more
    /// than one row matches this query; the first one found is returned
    /// (same ambiguity the source this was ported from accepts).
    async fn get_block_by_prev_hash(&self, hash: &BlockHash) -> Result<Option<Block>>;

    /// List all blocks sharing a reorg reference, ascending by height.
    async fn list_blocks_by_reorg(&self, reorg_id: Uuid) -> Result<Vec<Block>>;

    /// Upsert a block header by its natural key
    /// `(blockchain_id, kernel_root, cuckoo_solution)`, returning the
    /// existing or newly created row's id.
    async fn upsert_block_header(&self, header: &BlockHeader) -> Result<Uuid>;

    /// Insert a block. Returns `Ok(None)` when a row with the same hash
    /// already exists (the caller should then fetch and return it —
    /// idempotence per I7), `Ok(Some(block))` when newly created.
    async fn try_insert_block(&self, block: &Block) -> Result<Option<Block>>;

    /// Update a block's `reorg_id` (used by the Reorg Applier's label flip).
    async fn set_block_reorg(&self, hash: &BlockHash, reorg_id: Option<Uuid>) -> Result<()>;

    /// Bulk-insert kernels.
    async fn insert_kernels(&self, kernels: &[Kernel]) -> Result<()>;

    /// Bulk-insert outputs.
    async fn insert_outputs(&self, outputs: &[Output]) -> Result<()>;

    /// Bulk-insert inputs.
    async fn insert_inputs(&self, inputs: &[Input]) -> Result<()>;

    /// Find outputs matching the given commitments, scoped to one branch
    /// (`reorg_id` — `None` means the main chain).
    async fn find_outputs_by_commitment(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        commitments: &[Commitment],
    ) -> Result<Vec<Output>>;

    /// Find inputs matching the given commitments, scoped to one branch.
    async fn find_inputs_by_commitment(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        commitments: &[Commitment],
    ) -> Result<Vec<Input>>;

    /// Mark outputs `spent = value`.
    async fn set_outputs_spent(&self, output_ids: &[Uuid], spent: bool) -> Result<()>;

    /// Link inputs to the output they consume.
    async fn link_inputs_to_output(&self, input_ids: &[Uuid], output_id: Uuid) -> Result<()>;

    /// Clear an input's output link (used when a branch-repair determines
    /// the previous link no longer holds).
    async fn unlink_inputs(&self, input_ids: &[Uuid]) -> Result<()>;

    /// List all outputs owned by blocks in `[start_height, end_height]` on
    /// the given reorg branch (`None` = main chain).
    async fn list_outputs_in_range(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        start_height: Height,
        end_height: Height,
    ) -> Result<Vec<Output>>;

    /// List all inputs owned by blocks in `[start_height, end_height]` on
    /// the given reorg branch (`None` = main chain).
    async fn list_inputs_in_range(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        start_height: Height,
        end_height: Height,
    ) -> Result<Vec<Input>>;

    /// Create a new reorg record.
    async fn insert_reorg(&self, reorg: &Reorg) -> Result<()>;

    /// Delete a reorg record (used when it becomes orphaned — "absorbed").
    async fn delete_reorg_if_orphaned(&self, reorg_id: Uuid) -> Result<bool>;

    /// Whether a blockchain-delete job is currently in flight.
    async fn is_delete_in_flight(&self, blockchain_id: Uuid) -> Result<bool>;

    /// Record a newly started ingestion task.
    async fn insert_task(&self, task: &IngestionTask) -> Result<()>;

    /// Persist a task's updated status/failure reason/timestamp.
    async fn update_task(&self, task: &IngestionTask) -> Result<()>;

    /// Look up a task by id.
    async fn get_task(&self, id: Uuid) -> Result<Option<IngestionTask>>;
}

/// The top-level store port: opens transactions and exposes auto-committing
/// convenience methods via [`StoreReadWrite`].
#[async_trait]
pub trait Store: StoreReadWrite {
    /// Begin a new transactional scope.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}
