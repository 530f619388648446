//! Integration tests for `PostgresStore` against a real `PostgreSQL` instance.

mod common;

use common::fixtures::{TestDb, block_fixtures, chain_fixtures, task_fixtures};
use mw_chain_indexer::ports::{Store, StoreReadWrite};
use mw_chain_indexer::types::entities::TaskTarget;
use mw_chain_indexer::types::enums::{OutputType, TaskStatus};
use mw_chain_indexer::types::primitives::Height;

#[tokio::test]
async fn blockchain_lookup_by_slug() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;

    let found = db.store.get_blockchain("grin-main").await.unwrap().expect("blockchain exists");
    assert_eq!(found.id, blockchain.id);
    assert_eq!(found.slug, blockchain.slug);

    assert!(db.store.get_blockchain("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn header_upsert_deduplicates_by_natural_key() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;

    let header = block_fixtures::test_header(blockchain.id, 1);
    let first_id = db.store.upsert_block_header(&header).await.unwrap();
    let second_id = db.store.upsert_block_header(&header).await.unwrap();

    assert_eq!(first_id, second_id);
}

#[tokio::test]
async fn try_insert_block_rejects_duplicate_hash() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let header = block_fixtures::test_header(blockchain.id, 1);
    let header_id = db.store.upsert_block_header(&header).await.unwrap();
    let block = block_fixtures::test_block(blockchain.id, header_id, 1, 1, None);

    let first = db.store.try_insert_block(&block).await.unwrap();
    assert!(first.is_some());

    let second = db.store.try_insert_block(&block).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn main_chain_lookup_ignores_reorged_blocks() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let header = block_fixtures::test_header(blockchain.id, 1);
    let header_id = db.store.upsert_block_header(&header).await.unwrap();
    let block = block_fixtures::test_block(blockchain.id, header_id, 10, 1, None);
    db.store.try_insert_block(&block).await.unwrap();

    let found = db.store.get_main_chain_block_at(blockchain.id, Height::new(10)).await.unwrap();
    assert_eq!(found.map(|b| b.hash), Some(block.hash));

    let reorg = task_fixtures::test_reorg(blockchain.id, block.hash, block.hash, block_fixtures::hash(2));
    db.store.insert_reorg(&reorg).await.unwrap();
    db.store.set_block_reorg(&block.hash, Some(reorg.id)).await.unwrap();

    let found_after = db.store.get_main_chain_block_at(blockchain.id, Height::new(10)).await.unwrap();
    assert!(found_after.is_none());
}

#[tokio::test]
async fn output_and_input_linkage_round_trips() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let header = block_fixtures::test_header(blockchain.id, 1);
    let header_id = db.store.upsert_block_header(&header).await.unwrap();
    let block = block_fixtures::test_block(blockchain.id, header_id, 1, 1, None);
    db.store.try_insert_block(&block).await.unwrap();

    let output = block_fixtures::test_output(block.hash, 5, OutputType::Plain);
    db.store.insert_outputs(&[output.clone()]).await.unwrap();

    let found = db.store.find_outputs_by_commitment(blockchain.id, None, &[output.commitment.clone()]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, output.id);

    let input = block_fixtures::test_input(block.hash, 5);
    db.store.insert_inputs(&[input.clone()]).await.unwrap();
    db.store.link_inputs_to_output(&[input.id], output.id).await.unwrap();
    db.store.set_outputs_spent(&[output.id], true).await.unwrap();

    let spent = db.store.find_outputs_by_commitment(blockchain.id, None, &[output.commitment.clone()]).await.unwrap();
    assert!(spent[0].spent);

    db.store.unlink_inputs(&[input.id]).await.unwrap();
    let pending = db.store.find_inputs_by_commitment(blockchain.id, None, &[input.commitment.clone()]).await.unwrap();
    assert_eq!(pending[0].output_id, None);
}

#[tokio::test]
async fn ingestion_task_lifecycle_persists() {
    let db = TestDb::new().await;
    let task = task_fixtures::test_bootstrap_task("grin-main");
    db.store.insert_task(&task).await.unwrap();

    let mut updated = task.clone();
    updated.succeed(chrono::Utc::now());
    db.store.update_task(&updated).await.unwrap();

    let found = db.store.get_task(task.id).await.unwrap().expect("task exists");
    assert_eq!(found.status, TaskStatus::Success);
    assert_eq!(found.target, TaskTarget::Blockchain(mw_chain_indexer::types::primitives::Slug::new("grin-main")));
}

#[tokio::test]
async fn transaction_rolls_back_on_error() {
    let db = TestDb::new().await;
    let blockchain = chain_fixtures::seed_blockchain(&db.pool, "grin-main", false).await;
    let header = block_fixtures::test_header(blockchain.id, 1);

    let tx = db.store.begin().await.unwrap();
    let header_id = tx.upsert_block_header(&header).await.unwrap();
    let block = block_fixtures::test_block(blockchain.id, header_id, 1, 1, None);
    tx.try_insert_block(&block).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(db.store.get_block_by_hash(&block.hash).await.unwrap().is_none());
}
