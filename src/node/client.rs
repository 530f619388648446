//! HTTP JSON-RPC client for the upstream node's foreign API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::error::NodeError;
use crate::node::wire::{BlockPayload, HeaderPayload, NodeResult, RpcRequest, RpcResponse, TipPayload, is_not_found};
use crate::ports::{NodeBlock, NodeClient, NodeHeader, NodeInput, NodeKernel, NodeOutput, Tip};
use crate::types::primitives::{BlockHash, CuckooSolution, Height};

/// Connect timeout: the node's foreign API binds promptly or not at all.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout: generous because the node's own background compaction can
/// stall a response for a long time without the connection itself dying.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// A [`NodeClient`] backed by `reqwest`, speaking JSON-RPC 2.0 over HTTP
/// Basic authentication against a single node's foreign API endpoint.
#[derive(Debug)]
pub struct ReqwestNodeClient {
    client: reqwest::Client,
    api_url: String,
    username: String,
    password: String,
    request_id: AtomicU64,
}

impl ReqwestNodeClient {
    /// Build a client targeting `api_url`, authenticating with HTTP Basic
    /// auth.
    ///
    /// # Errors
    /// Returns [`NodeError::Transport`] if the underlying HTTP client cannot
    /// be constructed (e.g. the platform's TLS backend failed to initialize).
    pub fn new(api_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(NodeError::Transport)?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            username: username.into(),
            password: password.into(),
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T, NodeError> {
        let request = RpcRequest::new(self.next_id(), method, params);

        let response = self
            .client
            .post(&self.api_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(NodeError::Transport)?;

        if let Err(status_err) = response.error_for_status_ref().map(|_| ()) {
            return Err(NodeError::Transport(status_err));
        }

        let body: RpcResponse<T> = response.json().await.map_err(NodeError::Transport)?;

        if let Some(error) = body.error {
            return Err(NodeError::Unknown { method: method.to_string(), detail: error.message });
        }

        match body.result {
            Some(NodeResult::Ok(value)) => Ok(value),
            Some(NodeResult::Err(detail)) if is_not_found(&detail) => {
                warn!(method, "node reported NotFound");
                Err(NodeError::NotFound)
            }
            Some(NodeResult::Err(detail)) => Err(NodeError::Unknown { method: method.to_string(), detail: detail.to_string() }),
            None => Err(NodeError::Unknown { method: method.to_string(), detail: "missing result field".into() }),
        }
    }
}

fn parse_hash(hex: &str) -> Result<BlockHash, NodeError> {
    BlockHash::from_hex(hex).map_err(|e| NodeError::Unknown { method: "<decode>".into(), detail: e.to_string() })
}

fn header_from_payload(payload: HeaderPayload) -> Result<NodeHeader, NodeError> {
    let prev_hash = payload.previous.map(|h| parse_hash(&h)).transpose()?;
    let cuckoo_solution = payload
        .pow
        .proofs
        .into_iter()
        .next()
        .unwrap_or_default();
    let cuckoo_solution = CuckooSolution::new(cuckoo_solution)
        .map_err(|e| NodeError::Unknown { method: "<decode>".into(), detail: e.to_string() })?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&payload.timestamp)
        .map_err(|e| NodeError::Unknown { method: "<decode>".into(), detail: e.to_string() })?
        .timestamp();

    Ok(NodeHeader {
        version: payload.version,
        height: Height::new(payload.height),
        hash: parse_hash(&payload.hash)?,
        prev_hash,
        timestamp,
        kernel_root: payload.kernel_root,
        output_root: payload.output_root,
        range_proof_root: payload.range_proof_root,
        kernel_mmr_size: payload.kernel_mmr_size,
        output_mmr_size: payload.output_mmr_size,
        cuckoo_solution,
        nonce: payload.pow.nonce,
        edge_bits: payload.pow.edge_bits,
        secondary_scaling: payload.pow.secondary_scaling,
        total_difficulty: payload.pow.total_difficulty,
        total_kernel_offset: payload.total_kernel_offset,
    })
}

fn block_from_payload(payload: BlockPayload) -> Result<NodeBlock, NodeError> {
    let header = header_from_payload(payload.header)?;

    let kernels = payload
        .kernels
        .into_iter()
        .map(|k| NodeKernel {
            features: kernel_features_tag(&k.features),
            fee: k.fee,
            fee_shift: k.fee_shift,
            lock_height: k.lock_height,
            excess: k.excess,
            excess_sig: k.excess_sig,
        })
        .collect();

    let outputs = payload
        .outputs
        .into_iter()
        .map(|o| NodeOutput {
            output_type: if o.output_type == "Coinbase" { 1 } else { 0 },
            commitment: o.commit,
            spent: o.spent,
            proof: o.proof,
            proof_hash: o.proof_hash,
            merkle_proof: o.merkle_proof,
            mmr_index: o.mmr_index,
        })
        .collect();

    let inputs = payload.inputs.into_iter().map(|i| NodeInput { commitment: i.commit }).collect();

    Ok(NodeBlock { header, kernels, outputs, inputs })
}

fn kernel_features_tag(name: &str) -> i16 {
    match name {
        "Coinbase" => 1,
        "HeightLocked" => 2,
        "NoRecentDuplicate" => 3,
        _ => 0,
    }
}

#[async_trait]
impl NodeClient for ReqwestNodeClient {
    #[instrument(skip(self))]
    async fn get_tip(&self) -> Result<Tip, NodeError> {
        let payload: TipPayload = self.call("get_tip", serde_json::json!([])).await?;
        Ok(Tip { height: Height::new(payload.height), hash: parse_hash(&payload.last_block_pushed)? })
    }

    #[instrument(skip(self))]
    async fn get_header(&self, height: Height) -> Result<NodeHeader, NodeError> {
        let payload: HeaderPayload = self.call("get_header", serde_json::json!([height.value(), null, null])).await?;
        header_from_payload(payload)
    }

    #[instrument(skip(self))]
    async fn get_block(&self, height: Height) -> Result<NodeBlock, NodeError> {
        let payload: BlockPayload = self.call("get_block", serde_json::json!([height.value(), null, null])).await?;
        block_from_payload(payload)
    }

    #[instrument(skip(self))]
    async fn get_blocks(&self, start: Height, end: Height, limit: u32, with_proofs: bool) -> Result<Vec<NodeBlock>, NodeError> {
        if !(1..=1000).contains(&limit) {
            return Err(NodeError::InvalidRequest(format!("limit must be in 1..=1000, got {limit}")));
        }

        let payloads: Vec<BlockPayload> = self
            .call("get_blocks", serde_json::json!([start.value(), end.value(), limit, with_proofs]))
            .await?;

        payloads.into_iter().map(block_from_payload).collect()
    }
}
