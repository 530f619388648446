//! Block Writer: fetches and persists a single block atomically.
//!
//! See the module-level design note on why every write goes through one
//! transaction: a partial write (header/block/kernels present but inputs or
//! outputs missing) would corrupt the invariants the Reorg Detector and
//! Reorg Applier depend on.

use std::collections::HashMap;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{DomainError, InfraError, Result};
use crate::metrics;
use crate::ports::{NodeBlock, NodeClient, NodeHeader, NodeInput, NodeKernel, NodeOutput, Store, StoreReadWrite};
use crate::store::BlockCache;
use crate::types::entities::{Block, BlockHeader, Blockchain, Input, Kernel, Output};
use crate::types::enums::{KernelFeatures, OutputType};
use crate::types::primitives::{Commitment, Height};

fn header_from_payload(blockchain_id: Uuid, header: &NodeHeader) -> BlockHeader {
    BlockHeader {
        id: Uuid::new_v4(),
        blockchain_id,
        version: header.version,
        kernel_root: header.kernel_root.clone(),
        output_root: header.output_root.clone(),
        range_proof_root: header.range_proof_root.clone(),
        kernel_mmr_size: header.kernel_mmr_size,
        output_mmr_size: header.output_mmr_size,
        cuckoo_solution: header.cuckoo_solution.clone(),
        nonce: header.nonce,
        edge_bits: header.edge_bits,
        secondary_scaling: header.secondary_scaling,
        total_difficulty: header.total_difficulty,
        total_kernel_offset: header.total_kernel_offset.clone(),
    }
}

fn block_from_payload(blockchain_id: Uuid, header_id: Uuid, payload: &NodeBlock) -> Result<Block> {
    let timestamp = chrono::DateTime::from_timestamp(payload.header.timestamp, 0)
        .ok_or_else(|| InfraError::Internal(format!("node reported unrepresentable timestamp {}", payload.header.timestamp)))?;

    Ok(Block {
        hash: payload.header.hash,
        blockchain_id,
        header_id,
        height: payload.header.height,
        timestamp,
        prev_hash: payload.header.prev_hash,
        input_count: i32::try_from(payload.inputs.len()).unwrap_or(i32::MAX),
        output_count: i32::try_from(payload.outputs.len()).unwrap_or(i32::MAX),
        kernel_count: i32::try_from(payload.kernels.len()).unwrap_or(i32::MAX),
        reorg_id: None,
    })
}

fn kernel_from_payload(block_hash: crate::types::primitives::BlockHash, payload: &NodeKernel) -> Result<Kernel> {
    Ok(Kernel {
        id: Uuid::new_v4(),
        block_hash,
        features: KernelFeatures::try_from(payload.features)
            .map_err(|e| InfraError::Internal(format!("node reported unknown kernel features: {e}")))?,
        fee: payload.fee,
        fee_shift: payload.fee_shift,
        lock_height: payload.lock_height,
        excess: Commitment::from_hex(&payload.excess).map_err(|e| InfraError::Internal(e.to_string()))?,
        excess_sig: payload.excess_sig.clone(),
    })
}

fn output_from_payload(block_hash: crate::types::primitives::BlockHash, payload: &NodeOutput) -> Result<Output> {
    Ok(Output {
        id: Uuid::new_v4(),
        block_hash,
        output_type: OutputType::try_from(payload.output_type)
            .map_err(|e| InfraError::Internal(format!("node reported unknown output type: {e}")))?,
        commitment: Commitment::from_hex(&payload.commitment).map_err(|e| InfraError::Internal(e.to_string()))?,
        spent: payload.spent,
        proof: payload.proof.clone(),
        proof_hash: payload.proof_hash.clone(),
        merkle_proof: payload.merkle_proof.clone(),
        mmr_index: payload.mmr_index,
    })
}

fn input_from_payload(
    block_hash: crate::types::primitives::BlockHash,
    payload: &NodeInput,
    output_by_commitment: &HashMap<String, Uuid>,
) -> Result<Input> {
    let commitment = Commitment::from_hex(&payload.commitment).map_err(|e| InfraError::Internal(e.to_string()))?;
    let output_id = output_by_commitment.get(commitment.as_str()).copied();
    Ok(Input { id: Uuid::new_v4(), block_hash, commitment, output_id })
}

/// Persist one block, fetching its payload via the prefetch cache when
/// `prefetch` is set.
///
/// # Errors
/// Propagates [`crate::error::NodeError`] from the fetch and any store
/// error. Never leaves partial state: the whole write happens inside one
/// transaction.
#[instrument(skip(store, cache, node_client, blockchain), fields(blockchain = %blockchain.slug, height = %height))]
pub async fn write_block(
    store: &dyn Store,
    cache: &BlockCache,
    node_client: &dyn NodeClient,
    node_slug: &str,
    blockchain: &Blockchain,
    height: Height,
    prefetch: bool,
) -> Result<Block> {
    let payload = if prefetch {
        cache.get_or_fetch(node_slug, node_client, height).await?
    } else {
        node_client.get_block(height).await?
    };

    let tx = store.begin().await?;
    match write_payload(tx.as_ref(), blockchain, &payload).await {
        Ok(block) => {
            tx.commit().await?;
            Ok(block)
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err)
        }
    }
}

/// The transactional body of [`write_block`], generic over the store so it
/// runs identically inside a transaction or (in tests) against a bare
/// in-memory fake.
async fn write_payload<S: StoreReadWrite + ?Sized>(store: &S, blockchain: &Blockchain, payload: &NodeBlock) -> Result<Block> {
    let header = header_from_payload(blockchain.id, &payload.header);
    let header_id = store.upsert_block_header(&header).await?;

    let candidate = block_from_payload(blockchain.id, header_id, payload)?;

    let Some(block) = store.try_insert_block(&candidate).await? else {
        info!("block already stored, returning existing row");
        return store
            .get_block_by_hash(&candidate.hash)
            .await?
            .ok_or_else(|| DomainError::IntegrityViolation {
                table: "blocks".into(),
                detail: format!("block {} reported as duplicate but not found on refetch", candidate.hash),
            })
            .map_err(Into::into);
    };
    metrics::record_block_written();

    let kernels = payload
        .kernels
        .iter()
        .map(|k| kernel_from_payload(block.hash, k))
        .collect::<Result<Vec<_>>>()?;
    if !kernels.is_empty() {
        store.insert_kernels(&kernels).await?;
    }

    let input_commitments = payload
        .inputs
        .iter()
        .map(|i| Commitment::from_hex(&i.commitment).map_err(|e| InfraError::Internal(e.to_string()).into()))
        .collect::<Result<Vec<_>>>()?;

    let existing_outputs = if input_commitments.is_empty() {
        Vec::new()
    } else {
        store.find_outputs_by_commitment(blockchain.id, None, &input_commitments).await?
    };
    let output_by_commitment: HashMap<String, Uuid> =
        existing_outputs.iter().map(|o| (o.commitment.as_str().to_string(), o.id)).collect();

    let inputs = payload
        .inputs
        .iter()
        .map(|i| input_from_payload(block.hash, i, &output_by_commitment))
        .collect::<Result<Vec<_>>>()?;
    if !inputs.is_empty() {
        store.insert_inputs(&inputs).await?;
    }

    let spent_output_ids: Vec<Uuid> = output_by_commitment.values().copied().collect();
    if !spent_output_ids.is_empty() {
        store.set_outputs_spent(&spent_output_ids, true).await?;
    }

    let output_commitments = payload
        .outputs
        .iter()
        .map(|o| Commitment::from_hex(&o.commitment).map_err(|e| InfraError::Internal(e.to_string()).into()))
        .collect::<Result<Vec<_>>>()?;

    let pending_inputs = if output_commitments.is_empty() {
        Vec::new()
    } else {
        store.find_inputs_by_commitment(blockchain.id, None, &output_commitments).await?
    };
    let mut pending_input_ids_by_commitment: HashMap<String, Vec<Uuid>> = HashMap::new();
    for input in pending_inputs {
        pending_input_ids_by_commitment.entry(input.commitment.as_str().to_string()).or_default().push(input.id);
    }

    let outputs = payload
        .outputs
        .iter()
        .map(|o| output_from_payload(block.hash, o))
        .collect::<Result<Vec<_>>>()?;
    if !outputs.is_empty() {
        store.insert_outputs(&outputs).await?;
    }

    for output in &outputs {
        if let Some(input_ids) = pending_input_ids_by_commitment.get(output.commitment.as_str()) {
            store.link_inputs_to_output(input_ids, output.id).await?;
        }
    }

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::primitives::BlockHash;

    fn kernel_payload() -> NodeKernel {
        NodeKernel { features: 0, fee: 10, fee_shift: 0, lock_height: 0, excess: "08".to_string() + &"a".repeat(64), excess_sig: "sig".into() }
    }

    #[test]
    fn kernel_conversion_maps_features() {
        let kernel = kernel_from_payload(BlockHash::new([1; 32]), &kernel_payload()).expect("valid kernel");
        assert_eq!(kernel.features, KernelFeatures::Plain);
    }

    #[test]
    fn kernel_conversion_rejects_unknown_feature_tag() {
        let mut payload = kernel_payload();
        payload.features = 99;
        let err = kernel_from_payload(BlockHash::new([1; 32]), &payload).expect_err("unknown feature tag");
        assert!(matches!(err, crate::error::AppError::Infra(InfraError::Internal(_))));
    }

    #[test]
    fn output_conversion_maps_coinbase() {
        let payload = NodeOutput {
            output_type: 1,
            commitment: "08".to_string() + &"b".repeat(64),
            spent: false,
            proof: String::new(),
            proof_hash: String::new(),
            merkle_proof: None,
            mmr_index: 0,
        };
        let output = output_from_payload(BlockHash::new([1; 32]), &payload).expect("valid output");
        assert_eq!(output.output_type, OutputType::Coinbase);
    }

    #[test]
    fn input_conversion_links_known_commitment() {
        let known_id = Uuid::new_v4();
        let commitment_hex = "08".to_string() + &"c".repeat(64);
        let mut map = HashMap::new();
        map.insert(commitment_hex.clone(), known_id);

        let payload = NodeInput { commitment: commitment_hex };
        let input = input_from_payload(BlockHash::new([1; 32]), &payload, &map).expect("valid input");
        assert_eq!(input.output_id, Some(known_id));
    }

    #[test]
    fn input_conversion_leaves_unknown_commitment_unlinked() {
        let payload = NodeInput { commitment: "08".to_string() + &"d".repeat(64) };
        let input = input_from_payload(BlockHash::new([1; 32]), &payload, &HashMap::new()).expect("valid input");
        assert!(input.output_id.is_none());
    }
}
