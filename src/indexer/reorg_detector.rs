//! Reorg Detector: discovers that a previously-recorded main chain has been
//! superseded, and describes the span that must be relabeled.
//!
//! Two independent entry points share no code because they walk the chain in
//! genuinely different shapes: the bootstrap path walks one block at a time
//! in both directions from a single newly-written block, re-fetching missing
//! ancestors/descendants as it goes; the live path walks two known chains
//! (the old main chain and the freshly-written replacement) in lockstep.
//! Both produce the same [`Reorg`] shape, which [`crate::indexer::reorg_applier`]
//! then applies.

use std::collections::HashSet;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::IngestionSettings;
use crate::error::{DomainError, Result};
use crate::metrics;
use crate::ports::{NodeClient, Store};
use crate::store::BlockCache;
use crate::types::entities::{Block, Blockchain, Reorg};
use crate::types::primitives::Height;

use super::block_writer;

/// The result of a single bootstrap-path detection run.
pub struct BootstrapDetection {
    /// The reorg discovered, if any.
    pub reorg: Option<Reorg>,
    /// Every height fetched (written) while detecting, so the bootstrap loop
    /// can skip them as already-visited.
    pub visited: HashSet<u64>,
}

/// Run reorg detection after a single bootstrap write.
///
/// `new_block` is the block just written by [`block_writer::write_block`].
/// `start_height` bounds the backward walk (the bootstrap range's floor);
/// walking past it without a found ancestor is not a divergence, just the
/// edge of what this node retains.
///
/// # Errors
/// Returns [`DomainError::ReorgBoundsExceeded`] if more than
/// `settings.reorg_detection_height_cap` heights are fetched backward with
/// no divergence found. Propagates store and node errors.
#[instrument(skip(store, cache, node_client, blockchain, new_block, settings), fields(blockchain = %blockchain.slug, height = %new_block.height))]
pub async fn detect_bootstrap(
    store: &dyn Store,
    cache: &BlockCache,
    node_client: &dyn NodeClient,
    node_slug: &str,
    blockchain: &Blockchain,
    new_block: &Block,
    start_height: Height,
    settings: &IngestionSettings,
) -> Result<BootstrapDetection> {
    let mut visited = HashSet::new();
    let mut demoted: Vec<Block> = Vec::new();

    let start_main_block = backward_walk(
        store,
        cache,
        node_client,
        node_slug,
        blockchain,
        new_block.clone(),
        start_height,
        settings.reorg_detection_height_cap,
        &mut demoted,
        &mut visited,
    )
    .await?;

    forward_walk(store, cache, node_client, node_slug, blockchain, new_block.clone(), &mut demoted, &mut visited).await?;

    if demoted.is_empty() {
        return Ok(BootstrapDetection { reorg: None, visited });
    }

    let start_reorg_block = demoted.iter().min_by_key(|b| b.height).expect("non-empty").clone();
    let end_reorg_block = demoted.iter().max_by_key(|b| b.height).expect("non-empty").clone();

    let reorg = Reorg {
        id: Uuid::new_v4(),
        blockchain_id: blockchain.id,
        start_reorg_block: start_reorg_block.hash,
        end_reorg_block: end_reorg_block.hash,
        start_main_block: start_main_block.hash,
        created_at: chrono::Utc::now(),
    };

    debug!(start_reorg = %start_reorg_block.height, end_reorg = %end_reorg_block.height, "bootstrap reorg detected");
    metrics::record_reorg_detected();
    Ok(BootstrapDetection { reorg: Some(reorg), visited })
}

/// Walk backward from `cur`, returning the block where the walk terminates
/// (the existing, unchanged ancestor or the genesis block).
#[allow(clippy::too_many_arguments)]
async fn backward_walk(
    store: &dyn Store,
    cache: &BlockCache,
    node_client: &dyn NodeClient,
    node_slug: &str,
    blockchain: &Blockchain,
    mut cur: Block,
    start_height: Height,
    max_backward_probe: u32,
    demoted: &mut Vec<Block>,
    visited: &mut HashSet<u64>,
) -> Result<Block> {
    let mut probed_without_divergence: u32 = 0;

    loop {
        let Some(prev_height) = cur.height.checked_prev() else {
            return Ok(cur);
        };

        match store.get_main_chain_block_at(blockchain.id, prev_height).await? {
            Some(stored_prev) if Some(stored_prev.hash) == cur.prev_hash => {
                // `cur` already links validly into the existing chain; it is
                // the new-chain block that replaced `start_reorg_block`, not
                // `stored_prev` itself.
                return Ok(cur);
            }
            Some(stored_prev) => {
                demoted.push(stored_prev);
                let replacement = block_writer::write_block(store, cache, node_client, node_slug, blockchain, prev_height, true).await?;
                visited.insert(prev_height.value());
                probed_without_divergence = 0;
                cur = replacement;
            }
            None => {
                if prev_height.value() < start_height.value() {
                    return Ok(cur);
                }
                probed_without_divergence += 1;
                if probed_without_divergence > max_backward_probe {
                    return Err(DomainError::ReorgBoundsExceeded(blockchain.slug.to_string()).into());
                }
                let replacement = block_writer::write_block(store, cache, node_client, node_slug, blockchain, prev_height, true).await?;
                visited.insert(prev_height.value());
                cur = replacement;
            }
        }
    }
}

/// Walk forward from `cur`, recording and replacing any stale descendants
/// already stored on the main chain.
async fn forward_walk(
    store: &dyn Store,
    cache: &BlockCache,
    node_client: &dyn NodeClient,
    node_slug: &str,
    blockchain: &Blockchain,
    mut cur: Block,
    demoted: &mut Vec<Block>,
    visited: &mut HashSet<u64>,
) -> Result<()> {
    loop {
        let next_height = cur.height.next();
        match store.get_main_chain_block_at(blockchain.id, next_height).await? {
            None => return Ok(()),
            Some(stored_next) if stored_next.prev_hash == Some(cur.hash) => return Ok(()),
            Some(stored_next) => {
                demoted.push(stored_next);
                let replacement = block_writer::write_block(store, cache, node_client, node_slug, blockchain, next_height, true).await?;
                visited.insert(next_height.value());
                cur = replacement;
            }
        }
    }
}

/// Run reorg detection from the live-ingress path: the Block Writer just
/// returned a block whose hash differs from the one previously stored at
/// that height on the main chain.
///
/// Unlike the bootstrap path, this never fetches missing ancestors — a gap
/// in the stored main chain here is a known limitation (see module docs).
///
/// # Errors
/// Propagates store errors. Never returns `Ok(None)` with pending
/// divergence outstanding — an empty result means the two chains are
/// identical below `new_block`.
#[instrument(skip(store, new_block, stored_at_height), fields(blockchain = %blockchain.slug, height = %new_block.height))]
pub async fn detect_live(store: &dyn Store, blockchain: &Blockchain, new_block: &Block, stored_at_height: &Block) -> Result<Option<Reorg>> {
    if new_block.hash == stored_at_height.hash {
        return Ok(None);
    }

    // Blocks above new_block's height are stale descendants of the
    // just-replaced row at `stored_at_height`; they require no further
    // walking to be known-demoted.
    let mut demoted: Vec<Block> = store.list_main_chain_from(blockchain.id, new_block.height).await?;
    demoted.retain(|b| b.hash != new_block.hash && b.hash != stored_at_height.hash);

    let mut new_main: Vec<Block> = Vec::new();
    let mut ancestor_new = new_block.clone();
    let mut ancestor_old = stored_at_height.clone();
    demoted.push(ancestor_old.clone());
    new_main.push(ancestor_new.clone());

    loop {
        let next_new = match ancestor_new.prev_hash {
            Some(hash) => store.get_block_by_hash(&hash).await?,
            None => None,
        };
        let next_old = match ancestor_old.prev_hash {
            Some(hash) => store.get_block_by_hash(&hash).await?,
            None => None,
        };

        match (next_new, next_old) {
            (Some(n), Some(o)) if n.hash != o.hash => {
                demoted.push(o.clone());
                new_main.push(n.clone());
                ancestor_new = n;
                ancestor_old = o;
            }
            _ => break,
        }
    }

    let start_reorg_block = demoted.iter().min_by_key(|b| b.height).expect("non-empty").clone();
    let end_reorg_block = demoted.iter().max_by_key(|b| b.height).expect("non-empty").clone();
    let start_main_block = new_main.iter().min_by_key(|b| b.height).expect("non-empty").clone();

    let reorg = Reorg {
        id: Uuid::new_v4(),
        blockchain_id: blockchain.id,
        start_reorg_block: start_reorg_block.hash,
        end_reorg_block: end_reorg_block.hash,
        start_main_block: start_main_block.hash,
        created_at: chrono::Utc::now(),
    };

    debug!(start_reorg = %start_reorg_block.height, end_reorg = %end_reorg_block.height, "live reorg detected");
    metrics::record_reorg_detected();
    Ok(Some(reorg))
}
