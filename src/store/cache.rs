//! In-memory block prefetch cache.
//!
//! Implements the wholesale-window-replace policy: on a miss for height `H`
//! on a given node, the entire cached window for that node is replaced by
//! fetching `get_blocks(max(0, H-(window_size-1)), H, window_size)`. There is
//! no TTL or LRU eviction — a node has at most one writer in practice
//! (bootstrap or live ingress, never both concurrently for the same
//! blockchain), so the window simply tracks the most recently requested
//! range.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use crate::error::NodeError;
use crate::ports::{NodeBlock, NodeClient};
use crate::types::primitives::Height;

/// The cached window for a single node: a contiguous range of heights, held
/// as a sparse map since `get_blocks` may return fewer entries than
/// requested near genesis.
#[derive(Debug)]
struct Window {
    blocks: HashMap<u64, NodeBlock>,
}

/// Per-node prefetch cache over [`NodeBlock`] payloads.
///
/// Keyed by node slug. Safe to share across tasks via `Arc<BlockCache>`.
#[derive(Debug)]
pub struct BlockCache {
    windows: DashMap<String, Window>,
    window_size: u32,
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl BlockCache {
    /// Create an empty cache that refills `window_size` heights at a time.
    #[must_use]
    pub fn new(window_size: u32) -> Self {
        Self { windows: DashMap::new(), window_size }
    }

    /// Fetch the block at `height` for `node_slug`, refilling the window on
    /// a miss.
    ///
    /// # Errors
    /// Propagates [`NodeError`] from the refill fetch. Returns
    /// [`NodeError::NotFound`] if the node's own response does not include
    /// the requested height (can happen near the node's pruned tail).
    pub async fn get_or_fetch(
        &self,
        node_slug: &str,
        client: &dyn NodeClient,
        height: Height,
    ) -> Result<NodeBlock, NodeError> {
        if let Some(block) = self.peek(node_slug, height) {
            return Ok(block);
        }
        self.refill(node_slug, client, height).await?;
        self.peek(node_slug, height).ok_or(NodeError::NotFound)
    }

    /// Look up a height in the current window without triggering a refetch.
    #[must_use]
    pub fn peek(&self, node_slug: &str, height: Height) -> Option<NodeBlock> {
        self.windows
            .get(node_slug)
            .and_then(|w| w.blocks.get(&height.value()).cloned())
    }

    /// Discard the cached window for a node, forcing the next lookup to
    /// refetch.
    pub fn invalidate(&self, node_slug: &str) {
        self.windows.remove(node_slug);
    }

    async fn refill(&self, node_slug: &str, client: &dyn NodeClient, height: Height) -> Result<(), NodeError> {
        let start = Height::new(height.value().saturating_sub(u64::from(self.window_size) - 1));
        let fetched = client.get_blocks(start, height, self.window_size, false).await?;
        debug!(node_slug, start = start.value(), end = height.value(), count = fetched.len(), "refilled block cache window");

        let blocks = fetched
            .into_iter()
            .map(|b| (b.header.height.value(), b))
            .collect();
        self.windows.insert(node_slug.to_string(), Window { blocks });
        Ok(())
    }
}
