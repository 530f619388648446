//! Reorg Applier: given a freshly-created [`Reorg`] record, relabels the
//! affected blocks and repairs the derived `spent`/input-output linkage.
//!
//! Runs as three phases within one transaction, in the fixed order the
//! module docs on [`apply_reorg`] describe: label flip must happen first so
//! that the branch-repair and new-main-repair phases can query by
//! `reorg_id` instead of re-deriving the same hash chain a second time.

use tracing::{debug, instrument};

use crate::error::{DomainError, Result};
use crate::metrics;
use crate::ports::{Store, StoreReadWrite};
use crate::types::entities::{Block, Reorg};
use crate::types::primitives::Height;

fn missing_block(hash: &crate::types::primitives::BlockHash) -> DomainError {
    DomainError::IntegrityViolation { table: "blocks".into(), detail: format!("reorg references missing block {hash}") }
}

/// Apply a reorg: relabel its span, then repair the branch it vacated and
/// the branch that replaced it.
///
/// # Errors
/// Returns [`DomainError::IntegrityViolation`] if the reorg's recorded
/// hashes cannot be resolved to stored blocks. Propagates store errors.
#[instrument(skip(store, reorg), fields(reorg_id = %reorg.id, blockchain_id = %reorg.blockchain_id))]
pub async fn apply_reorg(store: &dyn Store, reorg: &Reorg) -> Result<()> {
    let tx = store.begin().await?;
    match apply_within(tx.as_ref(), reorg).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err)
        }
    }
}

async fn apply_within<S: StoreReadWrite + ?Sized>(store: &S, reorg: &Reorg) -> Result<()> {
    let start_reorg_block =
        store.get_block_by_hash(&reorg.start_reorg_block).await?.ok_or_else(|| missing_block(&reorg.start_reorg_block))?;
    let end_reorg_block = store.get_block_by_hash(&reorg.end_reorg_block).await?.ok_or_else(|| missing_block(&reorg.end_reorg_block))?;
    let start_main_block =
        store.get_block_by_hash(&reorg.start_main_block).await?.ok_or_else(|| missing_block(&reorg.start_main_block))?;

    label_flip(store, reorg, &start_reorg_block, &end_reorg_block, &start_main_block).await?;
    branch_repair(store, reorg, start_reorg_block.blockchain_id, start_reorg_block.height, end_reorg_block.height).await?;
    new_main_repair(store, start_main_block.blockchain_id, start_main_block.height).await?;

    debug!(
        start_reorg = %start_reorg_block.height,
        end_reorg = %end_reorg_block.height,
        start_main = %start_main_block.height,
        "reorg applied"
    );
    let depth_blocks = end_reorg_block.height.value().saturating_sub(start_reorg_block.height.value()) + 1;
    metrics::record_reorg_applied(depth_blocks);
    Ok(())
}

/// Phase A: relabel the demoted span to the new reorg, then walk the new
/// main chain forward absorbing/extending any prior reorg it supersedes.
async fn label_flip<S: StoreReadWrite + ?Sized>(
    store: &S,
    reorg: &Reorg,
    start_reorg_block: &Block,
    end_reorg_block: &Block,
    start_main_block: &Block,
) -> Result<()> {
    let mut cur = Some(start_reorg_block.clone());
    while let Some(block) = cur {
        if block.height > end_reorg_block.height {
            break;
        }
        store.set_block_reorg(&block.hash, Some(reorg.id)).await?;
        cur = store.get_block_by_prev_hash(&block.hash).await?;
    }

    let mut cur = Some(start_main_block.clone());
    while let Some(block) = cur {
        if let Some(old_reorg_id) = block.reorg_id {
            store.set_block_reorg(&block.hash, None).await?;
            store.delete_reorg_if_orphaned(old_reorg_id).await?;
        }
        cur = store.get_block_by_prev_hash(&block.hash).await?;
    }

    Ok(())
}

/// Phase B: within the demoted span, recompute `spent` and input-output
/// linkage using only same-branch matches, falling back to the main chain
/// for inputs whose spent output was never part of this branch.
async fn branch_repair<S: StoreReadWrite + ?Sized>(
    store: &S,
    reorg: &Reorg,
    blockchain_id: uuid::Uuid,
    start_height: Height,
    end_height: Height,
) -> Result<()> {
    let reorg_outputs = store.list_outputs_in_range(blockchain_id, Some(reorg.id), start_height, end_height).await?;
    let reorg_inputs = store.list_inputs_in_range(blockchain_id, Some(reorg.id), start_height, end_height).await?;

    for output in &reorg_outputs {
        match reorg_inputs.iter().find(|i| i.commitment == output.commitment) {
            Some(input) => {
                store.set_outputs_spent(&[output.id], true).await?;
                store.link_inputs_to_output(&[input.id], output.id).await?;
            }
            None => store.set_outputs_spent(&[output.id], false).await?,
        }
    }

    for input in &reorg_inputs {
        if reorg_outputs.iter().any(|o| o.commitment == input.commitment) {
            continue;
        }
        let main_match = store.find_outputs_by_commitment(blockchain_id, None, std::slice::from_ref(&input.commitment)).await?;
        if let Some(main_output) = main_match.into_iter().next() {
            store.set_outputs_spent(&[main_output.id], false).await?;
            store.link_inputs_to_output(&[input.id], main_output.id).await?;
        }
    }

    Ok(())
}

/// Phase C: walk the new main chain from `start_main_block.height` onward,
/// re-marking spent any output whose commitment is consumed there.
async fn new_main_repair<S: StoreReadWrite + ?Sized>(store: &S, blockchain_id: uuid::Uuid, start_height: Height) -> Result<()> {
    let main_blocks = store.list_main_chain_from(blockchain_id, start_height).await?;
    let Some(end_height) = main_blocks.iter().map(|b| b.height).max() else {
        return Ok(());
    };

    let inputs = store.list_inputs_in_range(blockchain_id, None, start_height, end_height).await?;
    for input in &inputs {
        let main_match = store.find_outputs_by_commitment(blockchain_id, None, std::slice::from_ref(&input.commitment)).await?;
        if let Some(main_output) = main_match.into_iter().next() {
            store.set_outputs_spent(&[main_output.id], true).await?;
            store.link_inputs_to_output(&[input.id], main_output.id).await?;
        }
    }

    Ok(())
}
