//! Test fixtures for integration tests.

use sqlx::PgPool;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

use mw_chain_indexer::store::PostgresStore;

use super::containers::{build_connection_string, postgres_image};

/// A test database instance with pool and container.
///
/// The container is kept alive as long as this struct exists; when dropped,
/// it is automatically stopped.
pub struct TestDb {
    /// The connection pool to the test database.
    pub pool: PgPool,
    /// The `PostgresStore` wrapping the pool.
    pub store: PostgresStore,
    /// The container (kept alive for the duration of the test).
    _container: ContainerAsync<Postgres>,
}

impl TestDb {
    /// Start a fresh container, connect, and run all migrations.
    ///
    /// # Panics
    /// Panics if container startup, connection, or migrations fail.
    pub async fn new() -> Self {
        let container = postgres_image().start().await.expect("failed to start postgres container");

        let host = container.get_host().await.expect("failed to get host");
        let port = container.get_host_port_ipv4(5432).await.expect("failed to get port");
        let connection_string = build_connection_string(&host.to_string(), port);

        let pool = connect_with_retries(&connection_string, 30).await.expect("failed to connect to database");

        let store = PostgresStore::new(pool.clone());
        store.run_migrations().await.expect("failed to run migrations");

        Self { pool, store, _container: container }
    }
}

/// Connect with retries: the container's "ready" message can fire slightly
/// before the server actually accepts connections.
async fn connect_with_retries(url: &str, max_attempts: u32) -> Result<PgPool, sqlx::Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPool::connect(url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) if attempts < max_attempts => {
                    tracing::debug!("connection verify failed (attempt {attempts}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if attempts < max_attempts => {
                tracing::debug!("connection failed (attempt {attempts}): {e}");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fixtures for node groups, nodes, and blockchains.
pub mod chain_fixtures {
    use sqlx::PgPool;
    use uuid::Uuid;

    use mw_chain_indexer::types::entities::{Blockchain, Node};
    use mw_chain_indexer::types::primitives::{LoadProgress, Slug};

    /// A test node bound to `group_id`, pointing at a fake RPC URL.
    #[must_use]
    pub fn test_node(group_id: Uuid, slug: &str, archive: bool) -> Node {
        Node {
            id: Uuid::new_v4(),
            slug: Slug::new(slug),
            name: slug.to_string(),
            group_id,
            api_url: "http://127.0.0.1:0/v2/owner".to_string(),
            api_username: "grin".to_string(),
            api_password: "test".to_string(),
            archive,
        }
    }

    /// A test blockchain bound to `node_id`, with no backfill progress yet.
    #[must_use]
    pub fn test_blockchain(node_id: Uuid, slug: &str, archive: bool) -> Blockchain {
        Blockchain { id: Uuid::new_v4(), slug: Slug::new(slug), node_id, archive, load_progress: LoadProgress::zero() }
    }

    /// Insert a node group, node, and blockchain row directly: there is no
    /// `Store` port method for provisioning these (they are administrative,
    /// out of the ingestion core's scope), so integration tests seed them
    /// with raw SQL instead.
    pub async fn seed_blockchain(pool: &PgPool, slug: &str, archive: bool) -> Blockchain {
        let group_id = Uuid::new_v4();
        sqlx::query("INSERT INTO node_groups (id, name) VALUES ($1, $2)")
            .bind(group_id)
            .bind(format!("group-{slug}"))
            .execute(pool)
            .await
            .expect("insert node group");

        let node = test_node(group_id, &format!("node-{slug}"), archive);
        sqlx::query(
            "INSERT INTO nodes (id, slug, name, group_id, api_url, api_username, api_password, archive)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(node.id)
        .bind(node.slug.as_str())
        .bind(&node.name)
        .bind(node.group_id)
        .bind(&node.api_url)
        .bind(&node.api_username)
        .bind(&node.api_password)
        .bind(node.archive)
        .execute(pool)
        .await
        .expect("insert node");

        let blockchain = test_blockchain(node.id, slug, archive);
        sqlx::query("INSERT INTO blockchains (id, slug, node_id, archive, load_progress) VALUES ($1, $2, $3, $4, $5)")
            .bind(blockchain.id)
            .bind(blockchain.slug.as_str())
            .bind(blockchain.node_id)
            .bind(blockchain.archive)
            .bind(sqlx::types::BigDecimal::from(0))
            .execute(pool)
            .await
            .expect("insert blockchain");

        blockchain
    }
}

/// Fixtures for blocks, headers, kernels, outputs, and inputs.
pub mod block_fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use mw_chain_indexer::types::entities::{Block, BlockHeader, Input, Kernel, Output};
    use mw_chain_indexer::types::enums::{KernelFeatures, OutputType};
    use mw_chain_indexer::types::primitives::{BlockHash, Commitment, CuckooSolution, Height};

    /// A deterministic 32-byte hash derived from a single tag byte, so tests
    /// can build readable chains like `hash(1) -> hash(2) -> hash(3)`.
    #[must_use]
    pub fn hash(tag: u8) -> BlockHash {
        BlockHash::new([tag; 32])
    }

    /// A deterministic commitment derived from a tag byte. `0x08` is a valid
    /// even-parity prefix byte for a Pedersen commitment.
    #[must_use]
    pub fn commitment(tag: u8) -> Commitment {
        let hex = format!("08{}", hex::encode([tag; 32]));
        Commitment::from_hex(&hex).expect("valid commitment hex")
    }

    fn cuckoo(tag: u8) -> CuckooSolution {
        CuckooSolution::new((0..42).map(|n| n + u64::from(tag) * 1000).collect()).expect("42-entry solution")
    }

    /// A block header naturally keyed by `(blockchain_id, kernel_root, cuckoo_solution)`.
    #[must_use]
    pub fn test_header(blockchain_id: Uuid, tag: u8) -> BlockHeader {
        BlockHeader {
            id: Uuid::new_v4(),
            blockchain_id,
            version: 2,
            kernel_root: format!("kernel-root-{tag}"),
            output_root: format!("output-root-{tag}"),
            range_proof_root: format!("range-proof-root-{tag}"),
            kernel_mmr_size: i64::from(tag),
            output_mmr_size: i64::from(tag),
            cuckoo_solution: cuckoo(tag),
            nonce: i64::from(tag),
            edge_bits: 31,
            secondary_scaling: 0,
            total_difficulty: i64::from(tag) * 1000,
            total_kernel_offset: format!("offset-{tag}"),
        }
    }

    /// A main-chain block at `height`, tagged by `tag`, chained to `prev_tag`.
    #[must_use]
    pub fn test_block(blockchain_id: Uuid, header_id: Uuid, height: u64, tag: u8, prev_tag: Option<u8>) -> Block {
        Block {
            hash: hash(tag),
            blockchain_id,
            header_id,
            height: Height::new(height),
            timestamp: Utc::now(),
            prev_hash: prev_tag.map(hash),
            input_count: 0,
            output_count: 0,
            kernel_count: 0,
            reorg_id: None,
        }
    }

    /// A plain-fee kernel owned by `block_hash`.
    #[must_use]
    pub fn test_kernel(block_hash: BlockHash, tag: u8, fee: i64) -> Kernel {
        Kernel {
            id: Uuid::new_v4(),
            block_hash,
            features: KernelFeatures::Plain,
            fee,
            fee_shift: 0,
            lock_height: 0,
            excess: commitment(tag),
            excess_sig: format!("sig-{tag}"),
        }
    }

    /// An unspent transaction output owned by `block_hash`.
    #[must_use]
    pub fn test_output(block_hash: BlockHash, tag: u8, output_type: OutputType) -> Output {
        Output {
            id: Uuid::new_v4(),
            block_hash,
            output_type,
            commitment: commitment(tag),
            spent: false,
            proof: format!("proof-{tag}"),
            proof_hash: format!("proof-hash-{tag}"),
            merkle_proof: if output_type == OutputType::Coinbase { None } else { Some(format!("merkle-{tag}")) },
            mmr_index: i64::from(tag),
        }
    }

    /// An input spending `commitment`, owned by `block_hash`.
    #[must_use]
    pub fn test_input(block_hash: BlockHash, tag: u8) -> Input {
        Input { id: Uuid::new_v4(), block_hash, commitment: commitment(tag), output_id: None }
    }
}

/// Fixtures for reorgs and ingestion tasks.
pub mod task_fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use mw_chain_indexer::types::entities::{IngestionTask, Reorg, TaskTarget};
    use mw_chain_indexer::types::enums::TaskKind;
    use mw_chain_indexer::types::primitives::{BlockHash, Slug};

    /// A reorg spanning `[start_reorg_block, end_reorg_block]`, replaced at `start_main_block`.
    #[must_use]
    pub fn test_reorg(blockchain_id: Uuid, start_reorg_block: BlockHash, end_reorg_block: BlockHash, start_main_block: BlockHash) -> Reorg {
        Reorg { id: Uuid::new_v4(), blockchain_id, start_reorg_block, end_reorg_block, start_main_block, created_at: Utc::now() }
    }

    /// A freshly-started bootstrap task targeting `slug`.
    #[must_use]
    pub fn test_bootstrap_task(slug: &str) -> IngestionTask {
        IngestionTask::start(TaskKind::Bootstrap, TaskTarget::Blockchain(Slug::new(slug)), Utc::now())
    }
}
