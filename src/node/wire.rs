//! JSON-RPC wire types for the upstream node's foreign API.
//!
//! Mirrors the response envelope described by the Mimblewimble node API v2
//! RFC: every call returns `{"result": {"Ok": ...}}` on success or
//! `{"result": {"Err": ...}}` on a logical failure, with a top-level
//! `"error"` object reserved for transport-adjacent JSON-RPC errors.

use serde::{Deserialize, Serialize};

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0", id, method, params }
    }
}

/// A JSON-RPC 2.0 top-level error object.
#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// The node's `Ok`/`Err` result wrapper, generic over the success payload.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
pub enum NodeResult<T> {
    Ok(T),
    Err(serde_json::Value),
}

/// A full JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
pub struct RpcResponse<T> {
    #[serde(default)]
    pub result: Option<NodeResult<T>>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// Whether an `Err` payload is the literal `"NotFound"` sentinel.
pub fn is_not_found(value: &serde_json::Value) -> bool {
    value.as_str() == Some("NotFound")
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOAD SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

/// `get_tip` result payload.
#[derive(Debug, Deserialize)]
pub struct TipPayload {
    pub height: u64,
    pub last_block_pushed: String,
}

/// Proof-of-work section of a header payload.
#[derive(Debug, Deserialize)]
pub struct PowPayload {
    pub nonce: i64,
    pub edge_bits: i16,
    pub secondary_scaling: i64,
    pub total_difficulty: i64,
    pub proofs: Vec<Vec<u64>>,
}

/// `get_header`/`get_block` header payload.
#[derive(Debug, Deserialize)]
pub struct HeaderPayload {
    pub version: i32,
    pub height: u64,
    pub hash: String,
    pub previous: Option<String>,
    pub timestamp: String,
    pub kernel_root: String,
    pub output_root: String,
    pub range_proof_root: String,
    pub kernel_mmr_size: i64,
    pub output_mmr_size: i64,
    pub total_kernel_offset: String,
    pub pow: PowPayload,
}

/// Kernel payload within a full block response.
#[derive(Debug, Deserialize)]
pub struct KernelPayload {
    pub features: String,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub fee_shift: i16,
    #[serde(default)]
    pub lock_height: i64,
    pub excess: String,
    pub excess_sig: String,
}

/// Output payload within a full block response.
#[derive(Debug, Deserialize)]
pub struct OutputPayload {
    pub output_type: String,
    pub commit: String,
    #[serde(default)]
    pub spent: bool,
    pub proof: String,
    pub proof_hash: String,
    #[serde(default)]
    pub merkle_proof: Option<String>,
    pub mmr_index: i64,
}

/// Input payload within a full block response.
#[derive(Debug, Deserialize)]
pub struct InputPayload {
    pub commit: String,
}

/// Full block payload as reported by `get_block`/`get_blocks`.
#[derive(Debug, Deserialize)]
pub struct BlockPayload {
    pub header: HeaderPayload,
    #[serde(default)]
    pub kernels: Vec<KernelPayload>,
    #[serde(default)]
    pub outputs: Vec<OutputPayload>,
    #[serde(default)]
    pub inputs: Vec<InputPayload>,
}
