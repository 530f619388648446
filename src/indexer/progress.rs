//! Load-progress computation shared by the Bootstrap Loader and the
//! periodic reconciliation job.

use crate::ports::NodeClient;
use crate::types::primitives::{Height, LoadProgress};

/// Discover the range of heights a node is willing to serve.
///
/// `end_height` is the node's current tip. `start_height` is read back from
/// a single-block `get_blocks(0, end_height, 1, with_proofs=false)` call,
/// since a non-archive (pruned) node has no dedicated RPC reporting its
/// earliest retained height.
///
/// # Errors
/// Propagates [`crate::error::NodeError`]. Returns
/// [`crate::error::DomainError::UpdateProgressFailed`] if the node reports
/// zero blocks for the probe request.
pub async fn bootstrap_heights(node_client: &dyn NodeClient) -> crate::error::Result<(Height, Height)> {
    use crate::error::DomainError;

    let tip = node_client.get_tip().await?;
    let probe = node_client.get_blocks(Height::new(0), tip.height, 1, false).await?;
    let start = probe
        .first()
        .map(|b| b.header.height)
        .ok_or_else(|| DomainError::UpdateProgressFailed("node returned no blocks for bootstrap-range probe".into()))?;

    Ok((start, tip.height))
}

/// Progress-reporting modulus: report every `step` heights processed.
///
/// `step = floor(range_size / 10^(2 + node_step))`, clamped to 1000 when
/// that floors to 0 so ranges under ~100 blocks report only at the end
/// rather than on every single block.
#[must_use]
pub fn report_step(range_size: u64, archive: bool) -> u64 {
    let node_step: u32 = if archive { 2 } else { 0 };
    let divisor = 10u64.pow(2 + node_step);
    let step = range_size / divisor;
    if step == 0 { 1000 } else { step }
}

/// Compute load progress for `processed` blocks out of `total`, quantized
/// per the node's archive flag.
#[must_use]
pub fn compute_progress(processed: u64, total: u64, archive: bool) -> LoadProgress {
    LoadProgress::from_ratio(processed, total, archive)
}
