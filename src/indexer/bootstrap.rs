//! Bootstrap Loader: backfills a blockchain's missing height range in
//! descending order, interleaving reorg detection and load-progress
//! reporting.
//!
//! Descending order matters: it means the first few blocks written are the
//! ones closest to the current tip, so a blockchain shows useful data in
//! the UI almost immediately rather than only once the entire history has
//! been walked.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::IngestionSettings;
use crate::error::{AppError, NodeError, Result};
use crate::metrics;
use crate::ports::{NodeClient, Store};
use crate::store::BlockCache;
use crate::types::entities::Blockchain;
use crate::types::primitives::{Height, LoadProgress};

use super::{block_writer, progress, reorg_applier, reorg_detector};

/// Outcome of a completed (non-cancelled) bootstrap run.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapOutcome {
    /// The end height actually reached — may be lower than requested if the
    /// node reported `NotFound` partway through (its tail was pruned).
    pub end_height: Height,
    /// Number of blocks actually written this run (excludes already-present
    /// heights skipped without a write).
    pub blocks_written: u64,
}

/// Backfill `[start_height, end_height]` for `blockchain`, descending.
///
/// # Errors
/// Returns [`crate::error::AppError::Aborted`] if `cancel` fires between
/// block writes. Propagates node and store errors otherwise.
#[instrument(skip(store, cache, node_client, blockchain, settings, cancel), fields(blockchain = %blockchain.slug, start_height = %start_height, end_height = %end_height))]
pub async fn run_bootstrap(
    store: &dyn Store,
    cache: &BlockCache,
    node_client: &dyn NodeClient,
    node_slug: &str,
    blockchain: &Blockchain,
    start_height: Height,
    end_height: Height,
    skip_reorg_check: bool,
    settings: &IngestionSettings,
    cancel: &CancellationToken,
) -> Result<BootstrapOutcome> {
    let started_at = std::time::Instant::now();
    let mut end_height = end_height;
    let mut visited: HashSet<u64> = HashSet::new();
    let mut reorg_checks_enabled = !skip_reorg_check;
    let mut checked_missing: u32 = 0;
    let mut blocks_written: u64 = 0;

    let range_size = end_height.value().saturating_sub(start_height.value()) + 1;
    let report_step = progress::report_step(range_size, blockchain.archive);
    let mut since_report: u64 = 0;

    let mut h = end_height.value();
    loop {
        if cancel.is_cancelled() {
            return Err(AppError::Aborted);
        }

        if h < start_height.value() {
            break;
        }
        let height = Height::new(h);

        let already_present = visited.contains(&h) || store.get_main_chain_block_at(blockchain.id, height).await?.is_some();
        if already_present {
            if h == start_height.value() {
                break;
            }
            h -= 1;
            continue;
        }

        let new_block = match block_writer::write_block(store, cache, node_client, node_slug, blockchain, height, true).await {
            Ok(block) => block,
            Err(AppError::Node(NodeError::NotFound)) => {
                info!(height = h, "node reports height as not found, truncating bootstrap range");
                end_height = Height::new(h.saturating_sub(1));
                break;
            }
            Err(err) => return Err(err),
        };
        visited.insert(h);
        blocks_written += 1;

        if reorg_checks_enabled {
            let detection =
                reorg_detector::detect_bootstrap(store, cache, node_client, node_slug, blockchain, &new_block, start_height, settings).await?;
            visited.extend(detection.visited.iter().copied());
            checked_missing += 1;

            if let Some(reorg) = detection.reorg {
                store.insert_reorg(&reorg).await?;
                reorg_applier::apply_reorg(store, &reorg).await?;
            }

            if checked_missing > settings.reorg_check_disable_after {
                info!("reorg-check budget exhausted, disabling reorg checks for the remainder of this run");
                reorg_checks_enabled = false;
            }
        }

        since_report += 1;
        if since_report >= report_step {
            since_report = 0;
            let processed = end_height.value().saturating_sub(h) + 1;
            let progress = progress::compute_progress(processed, range_size, blockchain.archive);
            store.update_load_progress(blockchain.id, &progress).await?;
        }

        if h == start_height.value() {
            break;
        }
        h -= 1;
    }

    store.update_load_progress(blockchain.id, &LoadProgress::complete(blockchain.archive)).await?;

    metrics::record_bootstrap_duration(started_at.elapsed());
    Ok(BootstrapOutcome { end_height, blocks_written })
}
