//! PostgreSQL implementation of the store ports using SQLx.
//!
//! Query logic lives in free functions taking a borrowed `PgConnection` so it
//! can run either against a connection freshly acquired from the pool
//! ([`PostgresStore`]) or against the connection backing an open transaction
//! ([`PgTransaction`]) without duplicating SQL.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless,
    clippy::use_self
)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::{FromRow, Postgres};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{InfraError, Result};
use crate::ports::store::{Store, StoreReadWrite, StoreTransaction};
use crate::types::entities::{
    Block, BlockHeader, Blockchain, IngestionTask, Input, Kernel, Output, Reorg, TaskTarget,
};
use crate::types::enums::{OutputType, TaskKind, TaskStatus};
use crate::types::primitives::{BlockHash, Commitment, Height, LoadProgress, Slug};

// ═══════════════════════════════════════════════════════════════════════════════
// ROWS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct BlockchainRow {
    id: Uuid,
    slug: String,
    node_id: Uuid,
    archive: bool,
    load_progress: sqlx::types::BigDecimal,
}

impl TryFrom<BlockchainRow> for Blockchain {
    type Error = InfraError;

    fn try_from(row: BlockchainRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            slug: Slug::new(row.slug),
            node_id: row.node_id,
            archive: row.archive,
            load_progress: LoadProgress::from_bigdecimal(row.load_progress),
        })
    }
}

#[derive(Debug, FromRow)]
struct BlockRow {
    hash: Vec<u8>,
    blockchain_id: Uuid,
    header_id: Uuid,
    height: i64,
    timestamp: DateTime<Utc>,
    prev_hash: Option<Vec<u8>>,
    input_count: i32,
    output_count: i32,
    kernel_count: i32,
    reorg_id: Option<Uuid>,
}

impl TryFrom<BlockRow> for Block {
    type Error = InfraError;

    fn try_from(row: BlockRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            hash: bytes_to_hash(row.hash)?,
            blockchain_id: row.blockchain_id,
            header_id: row.header_id,
            height: Height::new(row.height as u64),
            timestamp: row.timestamp,
            prev_hash: row.prev_hash.map(bytes_to_hash).transpose()?,
            input_count: row.input_count,
            output_count: row.output_count,
            kernel_count: row.kernel_count,
            reorg_id: row.reorg_id,
        })
    }
}

fn bytes_to_hash(bytes: Vec<u8>) -> std::result::Result<BlockHash, InfraError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| InfraError::Internal("invalid block hash length in DB".into()))?;
    Ok(BlockHash::new(array))
}

#[derive(Debug, FromRow)]
struct OutputRow {
    id: Uuid,
    block_hash: Vec<u8>,
    output_type: i16,
    commitment: String,
    spent: bool,
    proof: String,
    proof_hash: String,
    merkle_proof: Option<String>,
    mmr_index: i64,
}

impl TryFrom<OutputRow> for Output {
    type Error = InfraError;

    fn try_from(row: OutputRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            block_hash: bytes_to_hash(row.block_hash)?,
            output_type: OutputType::try_from(row.output_type)
                .map_err(|e| InfraError::Internal(format!("invalid output type in DB: {e}")))?,
            commitment: Commitment::from_hex(&row.commitment)
                .map_err(|e| InfraError::Internal(format!("invalid commitment in DB: {e}")))?,
            spent: row.spent,
            proof: row.proof,
            proof_hash: row.proof_hash,
            merkle_proof: row.merkle_proof,
            mmr_index: row.mmr_index,
        })
    }
}

#[derive(Debug, FromRow)]
struct InputRow {
    id: Uuid,
    block_hash: Vec<u8>,
    commitment: String,
    output_id: Option<Uuid>,
}

impl TryFrom<InputRow> for Input {
    type Error = InfraError;

    fn try_from(row: InputRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            block_hash: bytes_to_hash(row.block_hash)?,
            commitment: Commitment::from_hex(&row.commitment)
                .map_err(|e| InfraError::Internal(format!("invalid commitment in DB: {e}")))?,
            output_id: row.output_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    kind: i16,
    target_kind: i16,
    target_value: String,
    status: i16,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for IngestionTask {
    type Error = InfraError;

    fn try_from(row: TaskRow) -> std::result::Result<Self, Self::Error> {
        let target = match row.target_kind {
            0 => TaskTarget::Blockchain(Slug::new(row.target_value)),
            other => {
                return Err(InfraError::Internal(format!(
                    "unknown task target_kind {other} in DB"
                )));
            }
        };
        Ok(Self {
            id: row.id,
            kind: TaskKind::try_from(row.kind)
                .map_err(|e| InfraError::Internal(format!("invalid task kind in DB: {e}")))?,
            target,
            status: TaskStatus::try_from(row.status)
                .map_err(|e| InfraError::Internal(format!("invalid task status in DB: {e}")))?,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn target_kind_and_value(target: &TaskTarget) -> (i16, &str) {
    match target {
        TaskTarget::Blockchain(slug) => (0, slug.as_str()),
    }
}

fn commitment_strings(commitments: &[Commitment]) -> Vec<String> {
    commitments.iter().map(|c| c.as_str().to_string()).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY LOGIC (shared between a pool-acquired connection and a transaction)
// ═══════════════════════════════════════════════════════════════════════════════

const BLOCKCHAIN_COLUMNS: &str = "id, slug, node_id, archive, load_progress";
const BLOCK_COLUMNS: &str =
    "hash, blockchain_id, header_id, height, timestamp, prev_hash, input_count, output_count, kernel_count, reorg_id";
const OUTPUT_COLUMNS: &str =
    "id, block_hash, output_type, commitment, spent, proof, proof_hash, merkle_proof, mmr_index";
const INPUT_COLUMNS: &str = "id, block_hash, commitment, output_id";
const TASK_COLUMNS: &str =
    "id, kind, target_kind, target_value, status, failure_reason, created_at, updated_at";

async fn q_get_blockchain(conn: &mut PgConnection, slug: &str) -> sqlx::Result<Option<BlockchainRow>> {
    sqlx::query_as::<_, BlockchainRow>(&format!(
        "SELECT {BLOCKCHAIN_COLUMNS} FROM blockchains WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(conn)
    .await
}

async fn q_update_load_progress(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    progress: &LoadProgress,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE blockchains SET load_progress = $2 WHERE id = $1")
        .bind(blockchain_id)
        .bind(progress.as_bigdecimal())
        .execute(conn)
        .await?;
    Ok(())
}

async fn q_get_block_by_hash(conn: &mut PgConnection, hash: &BlockHash) -> sqlx::Result<Option<BlockRow>> {
    sqlx::query_as::<_, BlockRow>(&format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE hash = $1"))
        .bind(hash.as_bytes().as_slice())
        .fetch_optional(conn)
        .await
}

async fn q_get_main_chain_block_at(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    height: i64,
) -> sqlx::Result<Option<BlockRow>> {
    sqlx::query_as::<_, BlockRow>(&format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE blockchain_id = $1 AND height = $2 AND reorg_id IS NULL"
    ))
    .bind(blockchain_id)
    .bind(height)
    .fetch_optional(conn)
    .await
}

async fn q_list_main_chain_from(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    from_height: i64,
) -> sqlx::Result<Vec<BlockRow>> {
    sqlx::query_as::<_, BlockRow>(&format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE blockchain_id = $1 AND height >= $2 AND reorg_id IS NULL ORDER BY height ASC"
    ))
    .bind(blockchain_id)
    .bind(from_height)
    .fetch_all(conn)
    .await
}

async fn q_list_blocks_by_reorg(conn: &mut PgConnection, reorg_id: Uuid) -> sqlx::Result<Vec<BlockRow>> {
    sqlx::query_as::<_, BlockRow>(&format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE reorg_id = $1 ORDER BY height ASC"
    ))
    .bind(reorg_id)
    .fetch_all(conn)
    .await
}

async fn q_get_block_by_prev_hash(conn: &mut PgConnection, prev_hash: &BlockHash) -> sqlx::Result<Option<BlockRow>> {
    sqlx::query_as::<_, BlockRow>(&format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE prev_hash = $1"))
        .bind(prev_hash.as_bytes().as_slice())
        .fetch_optional(conn)
        .await
}

async fn q_upsert_block_header(conn: &mut PgConnection, header: &BlockHeader) -> sqlx::Result<Uuid> {
    sqlx::query_scalar(
        r"
        INSERT INTO block_headers (
            id, blockchain_id, version, kernel_root, output_root, range_proof_root,
            kernel_mmr_size, output_mmr_size, cuckoo_solution, nonce, edge_bits,
            secondary_scaling, total_difficulty, total_kernel_offset
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (blockchain_id, kernel_root, cuckoo_solution) DO UPDATE SET
            blockchain_id = block_headers.blockchain_id
        RETURNING id
        ",
    )
    .bind(header.id)
    .bind(header.blockchain_id)
    .bind(header.version)
    .bind(&header.kernel_root)
    .bind(&header.output_root)
    .bind(&header.range_proof_root)
    .bind(header.kernel_mmr_size)
    .bind(header.output_mmr_size)
    .bind(header.cuckoo_solution.to_text())
    .bind(header.nonce)
    .bind(header.edge_bits)
    .bind(header.secondary_scaling)
    .bind(header.total_difficulty)
    .bind(&header.total_kernel_offset)
    .fetch_one(conn)
    .await
}

async fn q_try_insert_block(conn: &mut PgConnection, block: &Block) -> sqlx::Result<bool> {
    let result = sqlx::query(&format!(
        "INSERT INTO blocks ({BLOCK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) ON CONFLICT (hash) DO NOTHING"
    ))
    .bind(block.hash.as_bytes().as_slice())
    .bind(block.blockchain_id)
    .bind(block.header_id)
    .bind(block.height.value() as i64)
    .bind(block.timestamp)
    .bind(block.prev_hash.as_ref().map(|h| h.as_bytes().as_slice().to_vec()))
    .bind(block.input_count)
    .bind(block.output_count)
    .bind(block.kernel_count)
    .bind(block.reorg_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn q_set_block_reorg(
    conn: &mut PgConnection,
    hash: &BlockHash,
    reorg_id: Option<Uuid>,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE blocks SET reorg_id = $2 WHERE hash = $1")
        .bind(hash.as_bytes().as_slice())
        .bind(reorg_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn q_insert_kernels(conn: &mut PgConnection, kernels: &[Kernel]) -> sqlx::Result<()> {
    for kernel in kernels {
        sqlx::query(
            r"
            INSERT INTO kernels (id, block_hash, features, fee, fee_shift, lock_height, excess, excess_sig)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(kernel.id)
        .bind(kernel.block_hash.as_bytes().as_slice())
        .bind(kernel.features as i16)
        .bind(kernel.fee)
        .bind(kernel.fee_shift)
        .bind(kernel.lock_height)
        .bind(kernel.excess.as_str())
        .bind(&kernel.excess_sig)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn q_insert_outputs(conn: &mut PgConnection, outputs: &[Output]) -> sqlx::Result<()> {
    for output in outputs {
        sqlx::query(&format!(
            "INSERT INTO outputs ({OUTPUT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(output.id)
        .bind(output.block_hash.as_bytes().as_slice())
        .bind(output.output_type as i16)
        .bind(output.commitment.as_str())
        .bind(output.spent)
        .bind(&output.proof)
        .bind(&output.proof_hash)
        .bind(&output.merkle_proof)
        .bind(output.mmr_index)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn q_insert_inputs(conn: &mut PgConnection, inputs: &[Input]) -> sqlx::Result<()> {
    for input in inputs {
        sqlx::query(&format!("INSERT INTO inputs ({INPUT_COLUMNS}) VALUES ($1, $2, $3, $4)"))
            .bind(input.id)
            .bind(input.block_hash.as_bytes().as_slice())
            .bind(input.commitment.as_str())
            .bind(input.output_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn q_find_outputs_by_commitment(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    reorg_id: Option<Uuid>,
    commitments: &[String],
) -> sqlx::Result<Vec<OutputRow>> {
    sqlx::query_as::<_, OutputRow>(
        r"
        SELECT o.id, o.block_hash, o.output_type, o.commitment, o.spent, o.proof,
               o.proof_hash, o.merkle_proof, o.mmr_index
        FROM outputs o
        JOIN blocks b ON b.hash = o.block_hash
        WHERE b.blockchain_id = $1
          AND b.reorg_id IS NOT DISTINCT FROM $2
          AND o.commitment = ANY($3)
        ",
    )
    .bind(blockchain_id)
    .bind(reorg_id)
    .bind(commitments)
    .fetch_all(conn)
    .await
}

async fn q_find_inputs_by_commitment(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    reorg_id: Option<Uuid>,
    commitments: &[String],
) -> sqlx::Result<Vec<InputRow>> {
    sqlx::query_as::<_, InputRow>(
        r"
        SELECT i.id, i.block_hash, i.commitment, i.output_id
        FROM inputs i
        JOIN blocks b ON b.hash = i.block_hash
        WHERE b.blockchain_id = $1
          AND b.reorg_id IS NOT DISTINCT FROM $2
          AND i.commitment = ANY($3)
        ",
    )
    .bind(blockchain_id)
    .bind(reorg_id)
    .bind(commitments)
    .fetch_all(conn)
    .await
}

async fn q_set_outputs_spent(conn: &mut PgConnection, output_ids: &[Uuid], spent: bool) -> sqlx::Result<()> {
    sqlx::query("UPDATE outputs SET spent = $2 WHERE id = ANY($1)")
        .bind(output_ids)
        .bind(spent)
        .execute(conn)
        .await?;
    Ok(())
}

async fn q_link_inputs_to_output(
    conn: &mut PgConnection,
    input_ids: &[Uuid],
    output_id: Uuid,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE inputs SET output_id = $2 WHERE id = ANY($1)")
        .bind(input_ids)
        .bind(output_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn q_unlink_inputs(conn: &mut PgConnection, input_ids: &[Uuid]) -> sqlx::Result<()> {
    sqlx::query("UPDATE inputs SET output_id = NULL WHERE id = ANY($1)")
        .bind(input_ids)
        .execute(conn)
        .await?;
    Ok(())
}

async fn q_list_outputs_in_range(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    reorg_id: Option<Uuid>,
    start_height: i64,
    end_height: i64,
) -> sqlx::Result<Vec<OutputRow>> {
    sqlx::query_as::<_, OutputRow>(
        r"
        SELECT o.id, o.block_hash, o.output_type, o.commitment, o.spent, o.proof,
               o.proof_hash, o.merkle_proof, o.mmr_index
        FROM outputs o
        JOIN blocks b ON b.hash = o.block_hash
        WHERE b.blockchain_id = $1
          AND b.reorg_id IS NOT DISTINCT FROM $2
          AND b.height BETWEEN $3 AND $4
        ",
    )
    .bind(blockchain_id)
    .bind(reorg_id)
    .bind(start_height)
    .bind(end_height)
    .fetch_all(conn)
    .await
}

async fn q_list_inputs_in_range(
    conn: &mut PgConnection,
    blockchain_id: Uuid,
    reorg_id: Option<Uuid>,
    start_height: i64,
    end_height: i64,
) -> sqlx::Result<Vec<InputRow>> {
    sqlx::query_as::<_, InputRow>(
        r"
        SELECT i.id, i.block_hash, i.commitment, i.output_id
        FROM inputs i
        JOIN blocks b ON b.hash = i.block_hash
        WHERE b.blockchain_id = $1
          AND b.reorg_id IS NOT DISTINCT FROM $2
          AND b.height BETWEEN $3 AND $4
        ",
    )
    .bind(blockchain_id)
    .bind(reorg_id)
    .bind(start_height)
    .bind(end_height)
    .fetch_all(conn)
    .await
}

async fn q_insert_reorg(conn: &mut PgConnection, reorg: &Reorg) -> sqlx::Result<()> {
    sqlx::query(
        r"
        INSERT INTO reorgs (id, blockchain_id, start_reorg_block, end_reorg_block, start_main_block, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(reorg.id)
    .bind(reorg.blockchain_id)
    .bind(reorg.start_reorg_block.as_bytes().as_slice())
    .bind(reorg.end_reorg_block.as_bytes().as_slice())
    .bind(reorg.start_main_block.as_bytes().as_slice())
    .bind(reorg.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn q_delete_reorg_if_orphaned(conn: &mut PgConnection, reorg_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r"
        DELETE FROM reorgs
        WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM blocks WHERE reorg_id = $1)
        ",
    )
    .bind(reorg_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn q_is_delete_in_flight(conn: &mut PgConnection, blockchain_id: Uuid) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r"
        SELECT COUNT(*) FROM ingestion_tasks
        WHERE kind = $1 AND target_kind = 0 AND status = $2
          AND target_value = (SELECT slug FROM blockchains WHERE id = $3)
        ",
    )
    .bind(TaskKind::BlockchainDelete as i16)
    .bind(TaskStatus::InProgress as i16)
    .bind(blockchain_id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

async fn q_insert_task(conn: &mut PgConnection, task: &IngestionTask) -> sqlx::Result<()> {
    let (target_kind, target_value) = target_kind_and_value(&task.target);
    sqlx::query(&format!(
        "INSERT INTO ingestion_tasks ({TASK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
    ))
    .bind(task.id)
    .bind(task.kind as i16)
    .bind(target_kind)
    .bind(target_value)
    .bind(task.status as i16)
    .bind(&task.failure_reason)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn q_update_task(conn: &mut PgConnection, task: &IngestionTask) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE ingestion_tasks SET status = $2, failure_reason = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(task.id)
    .bind(task.status as i16)
    .bind(&task.failure_reason)
    .bind(task.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn q_get_task(conn: &mut PgConnection, id: Uuid) -> sqlx::Result<Option<TaskRow>> {
    sqlx::query_as::<_, TaskRow>(&format!("SELECT {TASK_COLUMNS} FROM ingestion_tasks WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// `PostgreSQL`-based implementation of [`Store`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store wrapping an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    /// Returns an error if migrations fail to apply.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InfraError::Internal(format!("migration error: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StoreReadWrite for PostgresStore {
    #[instrument(skip(self))]
    async fn get_blockchain(&self, slug: &str) -> Result<Option<Blockchain>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let row = q_get_blockchain(&mut conn, slug).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    #[instrument(skip(self, progress))]
    async fn update_load_progress(&self, blockchain_id: Uuid, progress: &LoadProgress) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_update_load_progress(&mut conn, blockchain_id, progress)
            .await
            .map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let row = q_get_block_by_hash(&mut conn, hash).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn get_main_chain_block_at(&self, blockchain_id: Uuid, height: Height) -> Result<Option<Block>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let row = q_get_main_chain_block_at(&mut conn, blockchain_id, height.value() as i64)
            .await
            .map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn list_main_chain_from(&self, blockchain_id: Uuid, from_height: Height) -> Result<Vec<Block>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let rows = q_list_main_chain_from(&mut conn, blockchain_id, from_height.value() as i64)
            .await
            .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Block::try_from(r).map_err(Into::into)).collect()
    }

    #[instrument(skip(self))]
    async fn get_block_by_prev_hash(&self, hash: &BlockHash) -> Result<Option<Block>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let row = q_get_block_by_prev_hash(&mut conn, hash).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn list_blocks_by_reorg(&self, reorg_id: Uuid) -> Result<Vec<Block>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let rows = q_list_blocks_by_reorg(&mut conn, reorg_id).await.map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Block::try_from(r).map_err(Into::into)).collect()
    }

    #[instrument(skip(self, header))]
    async fn upsert_block_header(&self, header: &BlockHeader) -> Result<Uuid> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_upsert_block_header(&mut conn, header).await.map_err(|e| InfraError::Database(e).into())
    }

    #[instrument(skip(self, block), fields(hash = %block.hash))]
    async fn try_insert_block(&self, block: &Block) -> Result<Option<Block>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let inserted = q_try_insert_block(&mut conn, block).await.map_err(InfraError::Database)?;
        if inserted {
            debug!("block inserted");
            Ok(Some(block.clone()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self))]
    async fn set_block_reorg(&self, hash: &BlockHash, reorg_id: Option<Uuid>) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_set_block_reorg(&mut conn, hash, reorg_id).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, kernels), fields(count = kernels.len()))]
    async fn insert_kernels(&self, kernels: &[Kernel]) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_insert_kernels(&mut conn, kernels).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, outputs), fields(count = outputs.len()))]
    async fn insert_outputs(&self, outputs: &[Output]) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_insert_outputs(&mut conn, outputs).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    async fn insert_inputs(&self, inputs: &[Input]) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_insert_inputs(&mut conn, inputs).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, commitments))]
    async fn find_outputs_by_commitment(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        commitments: &[Commitment],
    ) -> Result<Vec<Output>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let strings = commitment_strings(commitments);
        let rows = q_find_outputs_by_commitment(&mut conn, blockchain_id, reorg_id, &strings)
            .await
            .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Output::try_from(r).map_err(Into::into)).collect()
    }

    #[instrument(skip(self, commitments))]
    async fn find_inputs_by_commitment(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        commitments: &[Commitment],
    ) -> Result<Vec<Input>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let strings = commitment_strings(commitments);
        let rows = q_find_inputs_by_commitment(&mut conn, blockchain_id, reorg_id, &strings)
            .await
            .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Input::try_from(r).map_err(Into::into)).collect()
    }

    #[instrument(skip(self, output_ids), fields(count = output_ids.len()))]
    async fn set_outputs_spent(&self, output_ids: &[Uuid], spent: bool) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_set_outputs_spent(&mut conn, output_ids, spent).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, input_ids), fields(count = input_ids.len()))]
    async fn link_inputs_to_output(&self, input_ids: &[Uuid], output_id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_link_inputs_to_output(&mut conn, input_ids, output_id).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, input_ids), fields(count = input_ids.len()))]
    async fn unlink_inputs(&self, input_ids: &[Uuid]) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_unlink_inputs(&mut conn, input_ids).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_outputs_in_range(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        start_height: Height,
        end_height: Height,
    ) -> Result<Vec<Output>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let rows = q_list_outputs_in_range(
            &mut conn,
            blockchain_id,
            reorg_id,
            start_height.value() as i64,
            end_height.value() as i64,
        )
        .await
        .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Output::try_from(r).map_err(Into::into)).collect()
    }

    #[instrument(skip(self))]
    async fn list_inputs_in_range(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        start_height: Height,
        end_height: Height,
    ) -> Result<Vec<Input>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let rows = q_list_inputs_in_range(
            &mut conn,
            blockchain_id,
            reorg_id,
            start_height.value() as i64,
            end_height.value() as i64,
        )
        .await
        .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Input::try_from(r).map_err(Into::into)).collect()
    }

    #[instrument(skip(self, reorg), fields(id = %reorg.id))]
    async fn insert_reorg(&self, reorg: &Reorg) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_insert_reorg(&mut conn, reorg).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_reorg_if_orphaned(&self, reorg_id: Uuid) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_delete_reorg_if_orphaned(&mut conn, reorg_id).await.map_err(|e| InfraError::Database(e).into())
    }

    #[instrument(skip(self))]
    async fn is_delete_in_flight(&self, blockchain_id: Uuid) -> Result<bool> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_is_delete_in_flight(&mut conn, blockchain_id).await.map_err(|e| InfraError::Database(e).into())
    }

    #[instrument(skip(self, task), fields(id = %task.id))]
    async fn insert_task(&self, task: &IngestionTask) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_insert_task(&mut conn, task).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, task), fields(id = %task.id))]
    async fn update_task(&self, task: &IngestionTask) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        q_update_task(&mut conn, task).await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_task(&self, id: Uuid) -> Result<Option<IngestionTask>> {
        let mut conn = self.pool.acquire().await.map_err(InfraError::Database)?;
        let row = q_get_task(&mut conn, id).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(InfraError::Database)?;
        Ok(Box::new(PgTransaction {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A live transactional scope backed by an owned `sqlx` transaction.
///
/// Trait methods take `&self` (per [`StoreReadWrite`]), so the transaction is
/// held behind a mutex. A transaction is meant to serve a single logical
/// writer (the Block Writer's single-transaction algorithm is the only
/// strictly-required use), so the lock is never contended in practice.
pub struct PgTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl PgTransaction {
    async fn lock(&self) -> MutexGuard<'_, Option<sqlx::Transaction<'static, Postgres>>> {
        self.tx.lock().await
    }
}

#[async_trait]
impl StoreReadWrite for PgTransaction {
    async fn get_blockchain(&self, slug: &str) -> Result<Option<Blockchain>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let row = q_get_blockchain(tx, slug).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    async fn update_load_progress(&self, blockchain_id: Uuid, progress: &LoadProgress) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_update_load_progress(tx, blockchain_id, progress).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let row = q_get_block_by_hash(tx, hash).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    async fn get_main_chain_block_at(&self, blockchain_id: Uuid, height: Height) -> Result<Option<Block>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let row = q_get_main_chain_block_at(tx, blockchain_id, height.value() as i64)
            .await
            .map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    async fn list_main_chain_from(&self, blockchain_id: Uuid, from_height: Height) -> Result<Vec<Block>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let rows = q_list_main_chain_from(tx, blockchain_id, from_height.value() as i64)
            .await
            .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Block::try_from(r).map_err(Into::into)).collect()
    }

    async fn get_block_by_prev_hash(&self, hash: &BlockHash) -> Result<Option<Block>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let row = q_get_block_by_prev_hash(tx, hash).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }

    async fn list_blocks_by_reorg(&self, reorg_id: Uuid) -> Result<Vec<Block>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let rows = q_list_blocks_by_reorg(tx, reorg_id).await.map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Block::try_from(r).map_err(Into::into)).collect()
    }

    async fn upsert_block_header(&self, header: &BlockHeader) -> Result<Uuid> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_upsert_block_header(tx, header).await.map_err(|e| InfraError::Database(e).into())
    }

    async fn try_insert_block(&self, block: &Block) -> Result<Option<Block>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let inserted = q_try_insert_block(tx, block).await.map_err(InfraError::Database)?;
        Ok(inserted.then(|| block.clone()))
    }

    async fn set_block_reorg(&self, hash: &BlockHash, reorg_id: Option<Uuid>) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_set_block_reorg(tx, hash, reorg_id).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn insert_kernels(&self, kernels: &[Kernel]) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_insert_kernels(tx, kernels).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn insert_outputs(&self, outputs: &[Output]) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_insert_outputs(tx, outputs).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn insert_inputs(&self, inputs: &[Input]) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_insert_inputs(tx, inputs).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn find_outputs_by_commitment(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        commitments: &[Commitment],
    ) -> Result<Vec<Output>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let strings = commitment_strings(commitments);
        let rows = q_find_outputs_by_commitment(tx, blockchain_id, reorg_id, &strings)
            .await
            .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Output::try_from(r).map_err(Into::into)).collect()
    }

    async fn find_inputs_by_commitment(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        commitments: &[Commitment],
    ) -> Result<Vec<Input>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let strings = commitment_strings(commitments);
        let rows = q_find_inputs_by_commitment(tx, blockchain_id, reorg_id, &strings)
            .await
            .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Input::try_from(r).map_err(Into::into)).collect()
    }

    async fn set_outputs_spent(&self, output_ids: &[Uuid], spent: bool) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_set_outputs_spent(tx, output_ids, spent).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn link_inputs_to_output(&self, input_ids: &[Uuid], output_id: Uuid) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_link_inputs_to_output(tx, input_ids, output_id).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn unlink_inputs(&self, input_ids: &[Uuid]) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_unlink_inputs(tx, input_ids).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn list_outputs_in_range(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        start_height: Height,
        end_height: Height,
    ) -> Result<Vec<Output>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let rows = q_list_outputs_in_range(
            tx,
            blockchain_id,
            reorg_id,
            start_height.value() as i64,
            end_height.value() as i64,
        )
        .await
        .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Output::try_from(r).map_err(Into::into)).collect()
    }

    async fn list_inputs_in_range(
        &self,
        blockchain_id: Uuid,
        reorg_id: Option<Uuid>,
        start_height: Height,
        end_height: Height,
    ) -> Result<Vec<Input>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let rows = q_list_inputs_in_range(
            tx,
            blockchain_id,
            reorg_id,
            start_height.value() as i64,
            end_height.value() as i64,
        )
        .await
        .map_err(InfraError::Database)?;
        rows.into_iter().map(|r| Input::try_from(r).map_err(Into::into)).collect()
    }

    async fn insert_reorg(&self, reorg: &Reorg) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_insert_reorg(tx, reorg).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn delete_reorg_if_orphaned(&self, reorg_id: Uuid) -> Result<bool> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_delete_reorg_if_orphaned(tx, reorg_id).await.map_err(|e| InfraError::Database(e).into())
    }

    async fn is_delete_in_flight(&self, blockchain_id: Uuid) -> Result<bool> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_is_delete_in_flight(tx, blockchain_id).await.map_err(|e| InfraError::Database(e).into())
    }

    async fn insert_task(&self, task: &IngestionTask) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_insert_task(tx, task).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn update_task(&self, task: &IngestionTask) -> Result<()> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        q_update_task(tx, task).await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<IngestionTask>> {
        let mut guard = self.lock().await;
        let tx = guard.as_mut().expect("transaction used after commit/rollback");
        let row = q_get_task(tx, id).await.map_err(InfraError::Database)?;
        row.map(TryInto::try_into).transpose().map_err(Into::into)
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let tx = self.tx.into_inner().expect("transaction used after commit/rollback");
        tx.commit().await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let tx = self.tx.into_inner().expect("transaction used after commit/rollback");
        tx.rollback().await.map_err(InfraError::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresStore>();
    }

    #[test]
    fn pg_transaction_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgTransaction>();
    }

    // Full integration coverage against a real database lives in
    // tests/store_integration.rs.
}
