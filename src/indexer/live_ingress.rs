//! Live Ingress: applies one block notification arriving off the node's
//! real-time feed, outside of any bootstrap run.
//!
//! Unlike the bootstrap path, a missing ancestor here is never fetched —
//! the notification is assumed to describe a height immediately following
//! (or replacing) what is already stored, and the live Reorg Detector
//! (`detect_live`) handles the replacement case by walking only blocks
//! already on record.

use tracing::{info, instrument};

use crate::error::Result;
use crate::ports::{EventPublisher, NodeClient, Store};
use crate::store::BlockCache;
use crate::types::entities::Blockchain;
use crate::types::primitives::Height;
use crate::types::OutboundEvent;

use super::{block_writer, progress, reorg_applier, reorg_detector};

/// What happened to a single live-ingress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveIngressOutcome {
    /// No block was previously stored at this height; the new block was
    /// accepted onto the main chain with no divergence.
    NewBlock,
    /// The notification repeats a block already stored (duplicate delivery).
    Idempotent,
    /// The stored block at this height differed from the notification; a
    /// reorg was detected and applied.
    Reorged,
}

/// Process one live-ingress notification for `height`.
///
/// # Errors
/// Propagates node and store errors. Never partially applies a reorg — the
/// applier runs inside its own transaction (see
/// [`crate::indexer::reorg_applier::apply_reorg`]).
#[instrument(skip(store, cache, node_client, blockchain, publisher), fields(blockchain = %blockchain.slug, height = %height))]
pub async fn ingest_live_block(
    store: &dyn Store,
    cache: &BlockCache,
    node_client: &dyn NodeClient,
    node_slug: &str,
    blockchain: &Blockchain,
    publisher: &dyn EventPublisher,
    height: Height,
) -> Result<LiveIngressOutcome> {
    if store.is_delete_in_flight(blockchain.id).await? {
        info!("blockchain delete in flight, discarding live notification");
        return Ok(LiveIngressOutcome::Idempotent);
    }

    let previously_stored = store.get_main_chain_block_at(blockchain.id, height).await?;
    let new_block = block_writer::write_block(store, cache, node_client, node_slug, blockchain, height, false).await?;

    let outcome = match previously_stored {
        None => {
            publisher
                .publish(OutboundEvent::NewBlock { blockchain: blockchain.slug.clone(), hash: new_block.hash, height: new_block.height })
                .await;
            LiveIngressOutcome::NewBlock
        }
        Some(stored) if stored.hash == new_block.hash => LiveIngressOutcome::Idempotent,
        Some(stored) => {
            if let Some(reorg) = reorg_detector::detect_live(store, blockchain, &new_block, &stored).await? {
                store.insert_reorg(&reorg).await?;
                reorg_applier::apply_reorg(store, &reorg).await?;
                publisher.publish(OutboundEvent::Reorged { blockchain: blockchain.slug.clone() }).await;
            }
            LiveIngressOutcome::Reorged
        }
    };

    if let Ok((start, tip)) = progress::bootstrap_heights(node_client).await {
        let total = tip.value().saturating_sub(start.value()) + 1;
        let processed = new_block.height.value().saturating_sub(start.value()) + 1;
        let load_progress = progress::compute_progress(processed, total, blockchain.archive);
        store.update_load_progress(blockchain.id, &load_progress).await?;
    }

    Ok(outcome)
}
