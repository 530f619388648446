//! End-to-end scenario tests against a real `PostgreSQL` instance, encoding
//! the concrete reorg/bootstrap/idempotence behaviors the ingestion engine
//! must uphold for any sequence of block notifications.

mod common;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::fixtures::{chain_fixtures, TestDb};
use mw_chain_indexer::config::IngestionSettings;
use mw_chain_indexer::error::NodeError;
use mw_chain_indexer::indexer::{bootstrap, ingest_live_block, LiveIngressOutcome};
use mw_chain_indexer::ports::{EventPublisher, NodeBlock, NodeClient, NodeHeader, NodeInput, NodeKernel, NodeOutput, Store, Tip};
use mw_chain_indexer::store::BlockCache;
use mw_chain_indexer::types::enums::OutputType;
use mw_chain_indexer::types::primitives::{BlockHash, CuckooSolution, Height};
use mw_chain_indexer::types::OutboundEvent;

/// A hex commitment derived from a tag byte, matching the `0x08`-prefix
/// convention used throughout the fixture helpers.
fn commitment_hex(tag: u8) -> String {
    format!("08{}", hex::encode([tag; 32]))
}

fn header(height: u64, hash_byte: u8, prev_byte: Option<u8>) -> NodeHeader {
    NodeHeader {
        version: 2,
        height: Height::new(height),
        hash: BlockHash::new([hash_byte; 32]),
        prev_hash: prev_byte.map(|b| BlockHash::new([b; 32])),
        timestamp: 1_700_000_000 + height as i64,
        kernel_root: format!("kernel-{hash_byte}"),
        output_root: format!("output-{hash_byte}"),
        range_proof_root: format!("range-proof-{hash_byte}"),
        kernel_mmr_size: height as i64,
        output_mmr_size: height as i64,
        cuckoo_solution: CuckooSolution::new((0..42).map(|n| n + u64::from(hash_byte) * 1000).collect()).expect("42-entry solution"),
        nonce: hash_byte as i64,
        edge_bits: 31,
        secondary_scaling: 0,
        total_difficulty: height as i64 * 1000,
        total_kernel_offset: format!("offset-{hash_byte}"),
    }
}

fn kernel(tag: u8, fee: i64) -> NodeKernel {
    NodeKernel { features: 0, fee, fee_shift: 0, lock_height: 0, excess: commitment_hex(tag), excess_sig: format!("sig-{tag}") }
}

fn output(tag: u8) -> NodeOutput {
    NodeOutput {
        output_type: OutputType::Transaction as i16,
        commitment: commitment_hex(tag),
        spent: false,
        proof: format!("proof-{tag}"),
        proof_hash: format!("proof-hash-{tag}"),
        merkle_proof: Some(format!("merkle-{tag}")),
        mmr_index: i64::from(tag),
    }
}

fn input(tag: u8) -> NodeInput {
    NodeInput { commitment: commitment_hex(tag) }
}

/// A client that answers `get_block` for exactly one height; anything else
/// is `NotFound`. Live ingress never fetches more than one height per call.
struct SingleBlockClient(NodeBlock);

#[async_trait]
impl NodeClient for SingleBlockClient {
    async fn get_tip(&self) -> Result<Tip, NodeError> {
        Ok(Tip { height: self.0.header.height, hash: self.0.header.hash })
    }
    async fn get_header(&self, _height: Height) -> Result<NodeHeader, NodeError> {
        Ok(self.0.header.clone())
    }
    async fn get_block(&self, height: Height) -> Result<NodeBlock, NodeError> {
        if height == self.0.header.height {
            Ok(self.0.clone())
        } else {
            Err(NodeError::NotFound)
        }
    }
    async fn get_blocks(&self, _start: Height, _end: Height, _limit: u32, _with_proofs: bool) -> Result<Vec<NodeBlock>, NodeError> {
        Ok(Vec::new())
    }
}

struct NoOpPublisher;
#[async_trait]
impl EventPublisher for NoOpPublisher {
    async fn publish(&self, _event: OutboundEvent) {}
}

/// A client serving a fixed set of heights, used by the bootstrap tests.
struct RangedClient(HashMap<u64, NodeBlock>);

#[async_trait]
impl NodeClient for RangedClient {
    async fn get_tip(&self) -> Result<Tip, NodeError> {
        Err(NodeError::Unknown { method: "get_tip".into(), detail: "not used by bootstrap".into() })
    }
    async fn get_header(&self, _height: Height) -> Result<NodeHeader, NodeError> {
        unimplemented!("bootstrap only calls get_block in this engine")
    }
    async fn get_block(&self, height: Height) -> Result<NodeBlock, NodeError> {
        self.0.get(&height.value()).cloned().ok_or(NodeError::NotFound)
    }
    async fn get_blocks(&self, start: Height, end: Height, _limit: u32, _with_proofs: bool) -> Result<Vec<NodeBlock>, NodeError> {
        Ok(self.0.values().filter(|b| b.header.height.value() >= start.value() && b.header.height.value() <= end.value()).cloned().collect())
    }
}

fn bootstrap_settings() -> IngestionSettings {
    IngestionSettings { significant_reorg_threshold: 2, reorg_detection_height_cap: 1000, reorg_check_disable_after: 1000, progress_report_interval_secs: 60 }
}

/// S1 — a live reorg where a competing block at height 101 is itself
/// overtaken two steps later by the original branch's replacement,
/// re-absorbing the first reorg into a second, wider one.
#[tokio::test]
async fn s1_simple_live_reorg_converges_to_original_branch_with_one_reorg_record() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let cache = BlockCache::new(1000);
    let publisher = NoOpPublisher;

    async fn ingest(db: &TestDb, blockchain: &mw_chain_indexer::types::entities::Blockchain, cache: &BlockCache, publisher: &NoOpPublisher, block: NodeBlock) -> LiveIngressOutcome {
        let height = block.header.height;
        let client = SingleBlockClient(block);
        ingest_live_block(&db.store, cache, &client, "node-a", blockchain, publisher, height).await.expect("ingest succeeds")
    }

    let h100 = NodeBlock { header: header(100, 100, None), kernels: vec![], outputs: vec![output(1)], inputs: vec![] };
    let h101 = NodeBlock { header: header(101, 101, Some(100)), kernels: vec![kernel(10, 5)], outputs: vec![output(2), output(3)], inputs: vec![input(1)] };
    let h101x = NodeBlock { header: header(101, 151, Some(100)), kernels: vec![kernel(11, 5)], outputs: vec![output(5), output(8)], inputs: vec![] };
    let h102x = NodeBlock {
        header: header(102, 152, Some(151)),
        kernels: vec![kernel(12, 5)],
        outputs: vec![output(6), output(7), output(2)],
        inputs: vec![input(5)],
    };
    let h102 = NodeBlock { header: header(102, 102, Some(101)), kernels: vec![kernel(13, 5)], outputs: vec![output(4), output(5)], inputs: vec![input(3)] };

    assert_eq!(ingest(&db, &blockchain, &cache, &publisher, h100).await, LiveIngressOutcome::NewBlock);
    assert_eq!(ingest(&db, &blockchain, &cache, &publisher, h101).await, LiveIngressOutcome::NewBlock);

    assert_eq!(ingest(&db, &blockchain, &cache, &publisher, h101x).await, LiveIngressOutcome::Reorged);
    let main_101 = db.store.get_main_chain_block_at(blockchain.id, Height::new(101)).await.unwrap().expect("main at 101");
    assert_eq!(main_101.hash, BlockHash::new([151; 32]));

    assert_eq!(ingest(&db, &blockchain, &cache, &publisher, h102x).await, LiveIngressOutcome::NewBlock);
    let main_102 = db.store.get_main_chain_block_at(blockchain.id, Height::new(102)).await.unwrap().expect("main at 102");
    assert_eq!(main_102.hash, BlockHash::new([152; 32]));

    assert_eq!(ingest(&db, &blockchain, &cache, &publisher, h102).await, LiveIngressOutcome::Reorged);

    let final_101 = db.store.get_main_chain_block_at(blockchain.id, Height::new(101)).await.unwrap().expect("main at 101");
    assert_eq!(final_101.hash, BlockHash::new([101; 32]));
    let final_102 = db.store.get_main_chain_block_at(blockchain.id, Height::new(102)).await.unwrap().expect("main at 102");
    assert_eq!(final_102.hash, BlockHash::new([102; 32]));

    let reorg_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reorgs WHERE blockchain_id = $1").bind(blockchain.id).fetch_one(&db.pool).await.unwrap();
    assert_eq!(reorg_count, 1, "the first reorg is re-absorbed and deleted as orphaned once the second reorg settles");

    let reorg: (Vec<u8>, Vec<u8>, Vec<u8>) = sqlx::query_as("SELECT start_reorg_block, end_reorg_block, start_main_block FROM reorgs WHERE blockchain_id = $1")
        .bind(blockchain.id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(reorg.0, BlockHash::new([151; 32]).as_bytes().to_vec());
    assert_eq!(reorg.1, BlockHash::new([152; 32]).as_bytes().to_vec());
    assert_eq!(reorg.2, BlockHash::new([101; 32]).as_bytes().to_vec());
}

/// S3 — two identical notifications for the same block produce exactly one
/// row, with no reorg ever considered.
#[tokio::test]
async fn s3_duplicate_live_notification_is_idempotent() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let cache = BlockCache::new(1000);
    let publisher = NoOpPublisher;
    let block = NodeBlock { header: header(100, 100, None), kernels: vec![], outputs: vec![output(1)], inputs: vec![] };
    let client = SingleBlockClient(block);

    let first = ingest_live_block(&db.store, &cache, &client, "node-a", &blockchain, &publisher, Height::new(100)).await.unwrap();
    assert_eq!(first, LiveIngressOutcome::NewBlock);
    let second = ingest_live_block(&db.store, &cache, &client, "node-a", &blockchain, &publisher, Height::new(100)).await.unwrap();
    assert_eq!(second, LiveIngressOutcome::Idempotent);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocks WHERE blockchain_id = $1").bind(blockchain.id).fetch_one(&db.pool).await.unwrap();
    assert_eq!(count, 1);
    let reorgs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reorgs WHERE blockchain_id = $1").bind(blockchain.id).fetch_one(&db.pool).await.unwrap();
    assert_eq!(reorgs, 0);
}

/// S4 — a competing block is accepted, then the original reasserts itself;
/// a final repeat of the now-current block changes nothing further.
#[tokio::test]
async fn s4_reorg_then_cancelled_by_original_branch_reasserting() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let cache = BlockCache::new(1000);
    let publisher = NoOpPublisher;

    let h100 = NodeBlock { header: header(100, 100, None), kernels: vec![], outputs: vec![], inputs: vec![] };
    let h101_a = NodeBlock { header: header(101, 111, Some(100)), kernels: vec![], outputs: vec![output(20)], inputs: vec![] };
    let h101_b = NodeBlock { header: header(101, 112, Some(100)), kernels: vec![], outputs: vec![output(21)], inputs: vec![] };

    let client_100 = SingleBlockClient(h100);
    ingest_live_block(&db.store, &cache, &client_100, "node-a", &blockchain, &publisher, Height::new(100)).await.unwrap();

    let client_a = SingleBlockClient(h101_a.clone());
    let outcome_a = ingest_live_block(&db.store, &cache, &client_a, "node-a", &blockchain, &publisher, Height::new(101)).await.unwrap();
    assert_eq!(outcome_a, LiveIngressOutcome::NewBlock);

    let client_b = SingleBlockClient(h101_b.clone());
    let outcome_b = ingest_live_block(&db.store, &cache, &client_b, "node-a", &blockchain, &publisher, Height::new(101)).await.unwrap();
    assert_eq!(outcome_b, LiveIngressOutcome::Reorged);
    let main_after_b = db.store.get_main_chain_block_at(blockchain.id, Height::new(101)).await.unwrap().expect("main at 101");
    assert_eq!(main_after_b.hash, h101_b.header.hash);

    let outcome_a_again = ingest_live_block(&db.store, &cache, &client_a, "node-a", &blockchain, &publisher, Height::new(101)).await.unwrap();
    assert_eq!(outcome_a_again, LiveIngressOutcome::Reorged);
    let main_after_a_again = db.store.get_main_chain_block_at(blockchain.id, Height::new(101)).await.unwrap().expect("main at 101");
    assert_eq!(main_after_a_again.hash, h101_a.header.hash, "the original branch reasserts itself");

    let repeat = ingest_live_block(&db.store, &cache, &client_a, "node-a", &blockchain, &publisher, Height::new(101)).await.unwrap();
    assert_eq!(repeat, LiveIngressOutcome::Idempotent, "re-notifying the now-current block is a no-op");

    let demoted = db.store.get_block_by_hash(&h101_b.header.hash).await.unwrap().expect("demoted row retained");
    assert!(demoted.reorg_id.is_some());
}

/// S6 — requesting bootstrap past the node's actual tip truncates the walk
/// immediately: nothing below the first `NotFound` height is attempted in
/// this run, and the reported end height reflects the corrected ceiling for
/// a follow-up call.
#[tokio::test]
async fn s6_bootstrap_truncates_gracefully_when_node_lacks_the_requested_tip() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let cache = BlockCache::new(1000);

    let mut blocks = HashMap::new();
    for h in 1..=4u64 {
        blocks.insert(h, NodeBlock { header: header(h, h as u8, h.checked_sub(1).map(|p| p as u8)), kernels: vec![], outputs: vec![], inputs: vec![] });
    }
    // Heights 5 and 6 are not served: the node's real tip is 4, below the
    // requested end height.
    let client = RangedClient(blocks);

    let outcome = bootstrap::run_bootstrap(
        &db.store,
        &cache,
        &client,
        "node-a",
        &blockchain,
        Height::new(1),
        Height::new(6),
        true,
        &bootstrap_settings(),
        &CancellationToken::new(),
    )
    .await
    .expect("bootstrap completes without erroring on the prunable tail");

    assert_eq!(outcome.blocks_written, 0, "the first height checked (6) is already missing, so nothing is written this run");
    assert_eq!(outcome.end_height, Height::new(5));

    for h in 1..=6u64 {
        let present = db.store.get_main_chain_block_at(blockchain.id, Height::new(h)).await.unwrap();
        assert!(present.is_none(), "height {h} should not be backfilled by a run that truncated before reaching it");
    }
}

/// A second bootstrap call with the corrected end height (as reported by
/// the first) backfills the now-known-good range in full.
#[tokio::test]
async fn s6_followup_bootstrap_with_corrected_end_height_backfills_the_range() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let cache = BlockCache::new(1000);

    let mut blocks = HashMap::new();
    for h in 1..=4u64 {
        blocks.insert(h, NodeBlock { header: header(h, h as u8, h.checked_sub(1).map(|p| p as u8)), kernels: vec![], outputs: vec![], inputs: vec![] });
    }
    let client = RangedClient(blocks);

    let outcome = bootstrap::run_bootstrap(
        &db.store,
        &cache,
        &client,
        "node-a",
        &blockchain,
        Height::new(1),
        Height::new(4),
        true,
        &bootstrap_settings(),
        &CancellationToken::new(),
    )
    .await
    .expect("bootstrap succeeds for the node's actual range");

    assert_eq!(outcome.blocks_written, 4);
    assert_eq!(outcome.end_height, Height::new(4));
    for h in 1..=4u64 {
        let present = db.store.get_main_chain_block_at(blockchain.id, Height::new(h)).await.unwrap();
        assert!(present.is_some(), "height {h} should be backfilled");
    }
}
