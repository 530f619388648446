//! Node client port: the contract for talking to an upstream Mimblewimble
//! full node.
//!
//! Implementations distinguish `NotFound` from transport/unknown failures
//! (see [`crate::error::NodeError`]) because callers treat the three very
//! differently.

use async_trait::async_trait;

use crate::error::NodeError;
use crate::types::primitives::{BlockHash, CuckooSolution, Height};

/// The node's reported chain tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    /// Height of the tip.
    pub height: Height,
    /// Hash of the tip block.
    pub hash: BlockHash,
}

/// A block header as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHeader {
    /// Header version.
    pub version: i32,
    /// Height.
    pub height: Height,
    /// This header's hash.
    pub hash: BlockHash,
    /// Previous header's hash, `None` at genesis.
    pub prev_hash: Option<BlockHash>,
    /// Block timestamp (Unix seconds).
    pub timestamp: i64,
    /// Kernel MMR root.
    pub kernel_root: String,
    /// Output MMR root.
    pub output_root: String,
    /// Range-proof MMR root.
    pub range_proof_root: String,
    /// Kernel MMR size.
    pub kernel_mmr_size: i64,
    /// Output MMR size.
    pub output_mmr_size: i64,
    /// Cuckoo-cycle solution.
    pub cuckoo_solution: CuckooSolution,
    /// Proof-of-work nonce.
    pub nonce: i64,
    /// Cuckoo-cycle edge bits.
    pub edge_bits: i16,
    /// Secondary scaling factor.
    pub secondary_scaling: i64,
    /// Cumulative chain difficulty.
    pub total_difficulty: i64,
    /// Cumulative kernel offset.
    pub total_kernel_offset: String,
}

/// A kernel as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKernel {
    /// Feature tag, opaque (0-3; see [`crate::types::enums::KernelFeatures`]).
    pub features: i16,
    /// Fee paid.
    pub fee: i64,
    /// Fee shift.
    pub fee_shift: i16,
    /// Lock height.
    pub lock_height: i64,
    /// Excess commitment.
    pub excess: String,
    /// Excess signature.
    pub excess_sig: String,
}

/// An output as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutput {
    /// Output type tag (0 = transaction, 1 = coinbase).
    pub output_type: i16,
    /// Value commitment.
    pub commitment: String,
    /// Node-reported spent flag, refined by the Block Writer/Reorg Applier.
    pub spent: bool,
    /// Range proof, hex-encoded.
    pub proof: String,
    /// Range proof hash.
    pub proof_hash: String,
    /// Merkle proof of inclusion, absent for coinbase outputs or when
    /// `with_proofs = false` was requested.
    pub merkle_proof: Option<String>,
    /// Position in the output MMR.
    pub mmr_index: i64,
}

/// An input as reported by the node (the commitment being spent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInput {
    /// Commitment being spent.
    pub commitment: String,
}

/// A full block payload as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBlock {
    /// This block's header.
    pub header: NodeHeader,
    /// Kernels in this block.
    pub kernels: Vec<NodeKernel>,
    /// Outputs in this block.
    pub outputs: Vec<NodeOutput>,
    /// Inputs in this block.
    pub inputs: Vec<NodeInput>,
}

/// Port for the upstream node's JSON-RPC surface.
///
/// Every method may return [`NodeError::Transport`] or
/// [`NodeError::Unknown`]; `get_header`/`get_block` may additionally return
/// [`NodeError::NotFound`].
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Fetch the node's current chain tip.
    ///
    /// # Errors
    /// See [`NodeError`].
    async fn get_tip(&self) -> Result<Tip, NodeError>;

    /// Fetch a header by height.
    ///
    /// # Errors
    /// See [`NodeError`].
    async fn get_header(&self, height: Height) -> Result<NodeHeader, NodeError>;

    /// Fetch a full block by height.
    ///
    /// # Errors
    /// See [`NodeError`].
    async fn get_block(&self, height: Height) -> Result<NodeBlock, NodeError>;

    /// Fetch a range of blocks `[start, end]` inclusive, up to `limit`
    /// (which must be in `1..=1000`), optionally including merkle proofs.
    ///
    /// # Errors
    /// Returns [`NodeError::InvalidRequest`] if `limit` is outside
    /// `1..=1000`, otherwise see [`NodeError`].
    async fn get_blocks(
        &self,
        start: Height,
        end: Height,
        limit: u32,
        with_proofs: bool,
    ) -> Result<Vec<NodeBlock>, NodeError>;
}
