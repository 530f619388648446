//! Per-blockchain ingestion job supervisor.
//!
//! Enforces "at most one concurrent ingestion job per blockchain slug": a
//! new job first cancels and awaits any job already running for that slug
//! before it is spawned. Jobs are plain `tokio` tasks; cancellation is
//! cooperative, checked between block writes, never mid-transaction (see
//! [`crate::indexer::bootstrap`]).
//!
//! # `IngestionTask` lifecycle
//! `InProgress` → `{Success | Failure | Skipped}`. A job cancelled by a
//! targeted [`Supervisor::abort_for`] call ends `Failure("Aborted")`; a job
//! still running when [`Supervisor::shutdown`] fires ends
//! `Failure("Worker shutdown")`. The distinction is made here, not by the
//! job itself: both paths cancel the same per-job token, so the supervisor
//! checks its own shutdown flag once the job unwinds to tell them apart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};

use crate::config::IngestionSettings;
use crate::error::AppError;
use crate::ports::{EventPublisher, NodeClient, Store};
use crate::store::BlockCache;
use crate::types::entities::{Blockchain, IngestionTask, TaskTarget};
use crate::types::enums::TaskKind;
use crate::types::primitives::{Height, Slug};
use crate::types::OutboundEvent;

use super::bootstrap;

struct Job {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Tracks at most one in-flight job per blockchain slug.
pub struct Supervisor {
    jobs: Mutex<HashMap<Slug, Job>>,
    shutdown: CancellationToken,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        Self { jobs: Mutex::new(HashMap::new()), shutdown: CancellationToken::new() }
    }

    /// Whether `slug` currently has a live job.
    pub async fn is_running(&self, slug: &Slug) -> bool {
        self.jobs.lock().await.contains_key(slug)
    }

    /// Cancel and await any in-flight job for `slug`, if one exists.
    ///
    /// The awaited job's own task records its `IngestionTask` as
    /// `Failure("Aborted")` before this returns.
    #[instrument(skip(self), fields(blockchain = %slug))]
    pub async fn abort_for(&self, slug: &Slug) {
        let job = self.jobs.lock().await.remove(slug);
        if let Some(job) = job {
            job.cancel.cancel();
            let _ = job.handle.await;
        }
    }

    /// Cancel and await every in-flight job. Each ends
    /// `Failure("Worker shutdown")` rather than `Failure("Aborted")`.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let jobs: Vec<Job> = self.jobs.lock().await.drain().map(|(_, job)| job).collect();
        for job in jobs {
            let _ = job.handle.await;
        }
    }

    /// Enqueue a bootstrap job for `blockchain`, cancelling any job already
    /// running for the same slug first (per §5's "a new bootstrap request
    /// cancels any in-flight bootstrap or delete job for the same
    /// blockchain before enqueueing").
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(blockchain = %blockchain.slug))]
    pub async fn spawn_bootstrap(
        self: &Arc<Self>,
        store: Arc<dyn Store>,
        cache: Arc<BlockCache>,
        node_client: Arc<dyn NodeClient>,
        node_slug: String,
        blockchain: Blockchain,
        start_height: Height,
        end_height: Height,
        skip_reorg_check: bool,
        settings: IngestionSettings,
        publisher: Arc<dyn EventPublisher>,
    ) -> IngestionTask {
        self.abort_for(&blockchain.slug).await;

        let task = IngestionTask::start(TaskKind::Bootstrap, TaskTarget::Blockchain(blockchain.slug.clone()), Utc::now());
        if let Err(err) = store.insert_task(&task).await {
            error!(error = %err, "failed to record new ingestion task");
        }
        publisher.publish(OutboundEvent::TaskStatusChanged { task: task.clone() }).await;

        let cancel = CancellationToken::new();
        let slug = blockchain.slug.clone();
        let task_id = task.id;
        let supervisor = Arc::clone(self);
        let cancel_for_job = cancel.clone();

        let handle = tokio::spawn(async move {
            let outcome = bootstrap::run_bootstrap(
                store.as_ref(),
                cache.as_ref(),
                node_client.as_ref(),
                &node_slug,
                &blockchain,
                start_height,
                end_height,
                skip_reorg_check,
                &settings,
                &cancel_for_job,
            )
            .await;

            let mut task = match store.get_task(task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    warn!("ingestion task vanished before completion could be recorded");
                    return;
                }
                Err(err) => {
                    error!(error = %err, "failed to reload ingestion task for completion");
                    return;
                }
            };

            let now = Utc::now();
            match outcome {
                Ok(_) => task.succeed(now),
                Err(AppError::Aborted) if supervisor.shutdown.is_cancelled() => task.fail("Worker shutdown", now),
                Err(AppError::Aborted) => task.fail("Aborted", now),
                Err(err) => task.fail(err.to_string(), now),
            }

            if let Err(err) = store.update_task(&task).await {
                error!(error = %err, "failed to persist ingestion task outcome");
            }
            publisher.publish(OutboundEvent::TaskStatusChanged { task: task.clone() }).await;

            supervisor.jobs.lock().await.remove(&slug);
        });

        self.jobs.lock().await.insert(blockchain.slug.clone(), Job { handle, cancel });
        task
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::error::{NodeError, Result};
    use crate::ports::{NodeBlock, NodeHeader, StoreReadWrite, StoreTransaction, Tip};
    use crate::types::entities::{Block, BlockHeader, Input, Kernel, Output, Reorg};
    use crate::types::primitives::{BlockHash, Commitment, LoadProgress};

    #[derive(Default)]
    struct FakeStore {
        tasks: Mutex<HashMap<Uuid, IngestionTask>>,
    }

    #[async_trait]
    impl StoreReadWrite for FakeStore {
        async fn get_blockchain(&self, _slug: &str) -> Result<Option<Blockchain>> {
            Ok(None)
        }
        async fn update_load_progress(&self, _blockchain_id: Uuid, _progress: &LoadProgress) -> Result<()> {
            Ok(())
        }
        async fn get_block_by_hash(&self, _hash: &BlockHash) -> Result<Option<Block>> {
            Ok(None)
        }
        async fn get_main_chain_block_at(&self, _blockchain_id: Uuid, _height: Height) -> Result<Option<Block>> {
            Ok(None)
        }
        async fn list_main_chain_from(&self, _blockchain_id: Uuid, _from_height: Height) -> Result<Vec<Block>> {
            Ok(Vec::new())
        }
        async fn get_block_by_prev_hash(&self, _hash: &BlockHash) -> Result<Option<Block>> {
            Ok(None)
        }
        async fn list_blocks_by_reorg(&self, _reorg_id: Uuid) -> Result<Vec<Block>> {
            Ok(Vec::new())
        }
        async fn upsert_block_header(&self, header: &BlockHeader) -> Result<Uuid> {
            Ok(header.id)
        }
        async fn try_insert_block(&self, block: &Block) -> Result<Option<Block>> {
            Ok(Some(block.clone()))
        }
        async fn set_block_reorg(&self, _hash: &BlockHash, _reorg_id: Option<Uuid>) -> Result<()> {
            Ok(())
        }
        async fn insert_kernels(&self, _kernels: &[Kernel]) -> Result<()> {
            Ok(())
        }
        async fn insert_outputs(&self, _outputs: &[Output]) -> Result<()> {
            Ok(())
        }
        async fn insert_inputs(&self, _inputs: &[Input]) -> Result<()> {
            Ok(())
        }
        async fn find_outputs_by_commitment(&self, _blockchain_id: Uuid, _reorg_id: Option<Uuid>, _commitments: &[Commitment]) -> Result<Vec<Output>> {
            Ok(Vec::new())
        }
        async fn find_inputs_by_commitment(&self, _blockchain_id: Uuid, _reorg_id: Option<Uuid>, _commitments: &[Commitment]) -> Result<Vec<Input>> {
            Ok(Vec::new())
        }
        async fn set_outputs_spent(&self, _output_ids: &[Uuid], _spent: bool) -> Result<()> {
            Ok(())
        }
        async fn link_inputs_to_output(&self, _input_ids: &[Uuid], _output_id: Uuid) -> Result<()> {
            Ok(())
        }
        async fn unlink_inputs(&self, _input_ids: &[Uuid]) -> Result<()> {
            Ok(())
        }
        async fn list_outputs_in_range(&self, _blockchain_id: Uuid, _reorg_id: Option<Uuid>, _start_height: Height, _end_height: Height) -> Result<Vec<Output>> {
            Ok(Vec::new())
        }
        async fn list_inputs_in_range(&self, _blockchain_id: Uuid, _reorg_id: Option<Uuid>, _start_height: Height, _end_height: Height) -> Result<Vec<Input>> {
            Ok(Vec::new())
        }
        async fn insert_reorg(&self, _reorg: &Reorg) -> Result<()> {
            Ok(())
        }
        async fn delete_reorg_if_orphaned(&self, _reorg_id: Uuid) -> Result<bool> {
            Ok(false)
        }
        async fn is_delete_in_flight(&self, _blockchain_id: Uuid) -> Result<bool> {
            Ok(false)
        }
        async fn insert_task(&self, task: &IngestionTask) -> Result<()> {
            self.tasks.lock().await.insert(task.id, task.clone());
            Ok(())
        }
        async fn update_task(&self, task: &IngestionTask) -> Result<()> {
            self.tasks.lock().await.insert(task.id, task.clone());
            Ok(())
        }
        async fn get_task(&self, id: Uuid) -> Result<Option<IngestionTask>> {
            Ok(self.tasks.lock().await.get(&id).cloned())
        }
    }

    struct FakeTransaction(Arc<FakeStore>);

    #[async_trait]
    impl StoreTransaction for FakeTransaction {
        async fn commit(self: Box<Self>) -> Result<()> {
            Ok(())
        }
        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    macro_rules! delegate {
        ($ty:ty, $field:expr) => {
            #[async_trait]
            impl StoreReadWrite for $ty {
                async fn get_blockchain(&self, slug: &str) -> Result<Option<Blockchain>> {
                    $field(self).get_blockchain(slug).await
                }
                async fn update_load_progress(&self, blockchain_id: Uuid, progress: &LoadProgress) -> Result<()> {
                    $field(self).update_load_progress(blockchain_id, progress).await
                }
                async fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>> {
                    $field(self).get_block_by_hash(hash).await
                }
                async fn get_main_chain_block_at(&self, blockchain_id: Uuid, height: Height) -> Result<Option<Block>> {
                    $field(self).get_main_chain_block_at(blockchain_id, height).await
                }
                async fn list_main_chain_from(&self, blockchain_id: Uuid, from_height: Height) -> Result<Vec<Block>> {
                    $field(self).list_main_chain_from(blockchain_id, from_height).await
                }
                async fn get_block_by_prev_hash(&self, hash: &BlockHash) -> Result<Option<Block>> {
                    $field(self).get_block_by_prev_hash(hash).await
                }
                async fn list_blocks_by_reorg(&self, reorg_id: Uuid) -> Result<Vec<Block>> {
                    $field(self).list_blocks_by_reorg(reorg_id).await
                }
                async fn upsert_block_header(&self, header: &BlockHeader) -> Result<Uuid> {
                    $field(self).upsert_block_header(header).await
                }
                async fn try_insert_block(&self, block: &Block) -> Result<Option<Block>> {
                    $field(self).try_insert_block(block).await
                }
                async fn set_block_reorg(&self, hash: &BlockHash, reorg_id: Option<Uuid>) -> Result<()> {
                    $field(self).set_block_reorg(hash, reorg_id).await
                }
                async fn insert_kernels(&self, kernels: &[Kernel]) -> Result<()> {
                    $field(self).insert_kernels(kernels).await
                }
                async fn insert_outputs(&self, outputs: &[Output]) -> Result<()> {
                    $field(self).insert_outputs(outputs).await
                }
                async fn insert_inputs(&self, inputs: &[Input]) -> Result<()> {
                    $field(self).insert_inputs(inputs).await
                }
                async fn find_outputs_by_commitment(&self, blockchain_id: Uuid, reorg_id: Option<Uuid>, commitments: &[Commitment]) -> Result<Vec<Output>> {
                    $field(self).find_outputs_by_commitment(blockchain_id, reorg_id, commitments).await
                }
                async fn find_inputs_by_commitment(&self, blockchain_id: Uuid, reorg_id: Option<Uuid>, commitments: &[Commitment]) -> Result<Vec<Input>> {
                    $field(self).find_inputs_by_commitment(blockchain_id, reorg_id, commitments).await
                }
                async fn set_outputs_spent(&self, output_ids: &[Uuid], spent: bool) -> Result<()> {
                    $field(self).set_outputs_spent(output_ids, spent).await
                }
                async fn link_inputs_to_output(&self, input_ids: &[Uuid], output_id: Uuid) -> Result<()> {
                    $field(self).link_inputs_to_output(input_ids, output_id).await
                }
                async fn unlink_inputs(&self, input_ids: &[Uuid]) -> Result<()> {
                    $field(self).unlink_inputs(input_ids).await
                }
                async fn list_outputs_in_range(&self, blockchain_id: Uuid, reorg_id: Option<Uuid>, start_height: Height, end_height: Height) -> Result<Vec<Output>> {
                    $field(self).list_outputs_in_range(blockchain_id, reorg_id, start_height, end_height).await
                }
                async fn list_inputs_in_range(&self, blockchain_id: Uuid, reorg_id: Option<Uuid>, start_height: Height, end_height: Height) -> Result<Vec<Input>> {
                    $field(self).list_inputs_in_range(blockchain_id, reorg_id, start_height, end_height).await
                }
                async fn insert_reorg(&self, reorg: &Reorg) -> Result<()> {
                    $field(self).insert_reorg(reorg).await
                }
                async fn delete_reorg_if_orphaned(&self, reorg_id: Uuid) -> Result<bool> {
                    $field(self).delete_reorg_if_orphaned(reorg_id).await
                }
                async fn is_delete_in_flight(&self, blockchain_id: Uuid) -> Result<bool> {
                    $field(self).is_delete_in_flight(blockchain_id).await
                }
                async fn insert_task(&self, task: &IngestionTask) -> Result<()> {
                    $field(self).insert_task(task).await
                }
                async fn update_task(&self, task: &IngestionTask) -> Result<()> {
                    $field(self).update_task(task).await
                }
                async fn get_task(&self, id: Uuid) -> Result<Option<IngestionTask>> {
                    $field(self).get_task(id).await
                }
            }
        };
    }

    delegate!(FakeTransaction, |s: &FakeTransaction| s.0.clone());
    delegate!(Arc<FakeStore>, |s: &Arc<FakeStore>| s.clone());

    #[async_trait]
    impl Store for Arc<FakeStore> {
        async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
            Ok(Box::new(FakeTransaction(self.clone())))
        }
    }

    struct StubClient;

    #[async_trait]
    impl NodeClient for StubClient {
        async fn get_tip(&self) -> std::result::Result<Tip, NodeError> {
            Err(NodeError::NotFound)
        }
        async fn get_header(&self, _height: Height) -> std::result::Result<NodeHeader, NodeError> {
            Err(NodeError::NotFound)
        }
        async fn get_block(&self, _height: Height) -> std::result::Result<NodeBlock, NodeError> {
            Err(NodeError::NotFound)
        }
        async fn get_blocks(&self, _start: Height, _end: Height, _limit: u32, _with_proofs: bool) -> std::result::Result<Vec<NodeBlock>, NodeError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct NoOpPublisher {
        published: AtomicUsize,
    }

    #[async_trait]
    impl EventPublisher for NoOpPublisher {
        async fn publish(&self, _event: OutboundEvent) {
            self.published.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_blockchain() -> Blockchain {
        Blockchain { id: Uuid::new_v4(), slug: Slug::new("test-chain"), node_id: Uuid::new_v4(), archive: false, load_progress: LoadProgress::zero() }
    }

    #[tokio::test]
    async fn spawn_records_task_and_completes() {
        let supervisor = Arc::new(Supervisor::new());
        let store = Arc::new(FakeStore::default());
        let blockchain = test_blockchain();

        let task = supervisor
            .spawn_bootstrap(
                store.clone() as Arc<dyn Store>,
                Arc::new(BlockCache::new(1000)),
                Arc::new(StubClient) as Arc<dyn NodeClient>,
                "node-a".into(),
                blockchain.clone(),
                Height::new(5),
                Height::new(5),
                true,
                IngestionSettings {
                    significant_reorg_threshold: 2,
                    reorg_detection_height_cap: 100,
                    reorg_check_disable_after: 1000,
                    progress_report_interval_secs: 30,
                },
                Arc::new(NoOpPublisher::default()) as Arc<dyn EventPublisher>,
            )
            .await;

        // Node always 404s, so the bootstrap run truncates to nothing and
        // succeeds trivially once the job unwinds.
        for _ in 0..50 {
            if !supervisor.is_running(&blockchain.slug).await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let recorded = store.get_task(task.id).await.expect("store call succeeds").expect("task recorded");
        assert!(!supervisor.is_running(&blockchain.slug).await);
        assert_ne!(recorded.status, crate::types::enums::TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn abort_for_marks_task_aborted() {
        let supervisor = Arc::new(Supervisor::new());
        let store = Arc::new(FakeStore::default());
        let blockchain = test_blockchain();

        struct SlowClient;
        #[async_trait]
        impl NodeClient for SlowClient {
            async fn get_tip(&self) -> std::result::Result<Tip, NodeError> {
                Err(NodeError::NotFound)
            }
            async fn get_header(&self, _height: Height) -> std::result::Result<NodeHeader, NodeError> {
                Err(NodeError::NotFound)
            }
            async fn get_block(&self, height: Height) -> std::result::Result<NodeBlock, NodeError> {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                let h = height.value();
                Ok(NodeBlock {
                    header: NodeHeader {
                        version: 1,
                        height,
                        hash: BlockHash::new([h as u8; 32]),
                        prev_hash: h.checked_sub(1).map(|p| BlockHash::new([p as u8; 32])),
                        timestamp: 0,
                        kernel_root: format!("kernel-{h}"),
                        output_root: String::new(),
                        range_proof_root: String::new(),
                        kernel_mmr_size: 0,
                        output_mmr_size: 0,
                        cuckoo_solution: crate::types::primitives::CuckooSolution::new((0..42).map(|n| n + h * 100).collect())
                            .expect("42 entries"),
                        nonce: 0,
                        edge_bits: 31,
                        secondary_scaling: 0,
                        total_difficulty: 0,
                        total_kernel_offset: String::new(),
                    },
                    kernels: vec![],
                    outputs: vec![],
                    inputs: vec![],
                })
            }
            async fn get_blocks(&self, _start: Height, _end: Height, _limit: u32, _with_proofs: bool) -> std::result::Result<Vec<NodeBlock>, NodeError> {
                Ok(Vec::new())
            }
        }

        let task = supervisor
            .spawn_bootstrap(
                store.clone() as Arc<dyn Store>,
                Arc::new(BlockCache::new(1000)),
                Arc::new(SlowClient) as Arc<dyn NodeClient>,
                "node-a".into(),
                blockchain.clone(),
                Height::new(0),
                Height::new(10),
                true,
                IngestionSettings {
                    significant_reorg_threshold: 2,
                    reorg_detection_height_cap: 100,
                    reorg_check_disable_after: 1000,
                    progress_report_interval_secs: 30,
                },
                Arc::new(NoOpPublisher::default()) as Arc<dyn EventPublisher>,
            )
            .await;

        assert!(supervisor.is_running(&blockchain.slug).await);
        supervisor.abort_for(&blockchain.slug).await;

        let recorded = store.get_task(task.id).await.expect("store call succeeds").expect("task recorded");
        assert_eq!(recorded.status, crate::types::enums::TaskStatus::Failure);
        assert_eq!(recorded.failure_reason.as_deref(), Some("Aborted"));
    }
}
