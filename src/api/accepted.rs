//! `POST /api/blockchains/{slug}/accepted` — live ingress entry point.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{ApiError, DomainError};
use crate::indexer;
use crate::types::primitives::Height;

use super::state::AppState;

/// Body shape mirrors the node's "block accepted" webhook: only `height` is
/// actually consulted — the payload itself is re-fetched from the node
/// inside the Block Writer rather than trusted from the notification.
#[derive(Debug, Deserialize)]
pub struct AcceptedBody {
    /// Notification payload envelope.
    pub data: AcceptedData,
}

/// Inner envelope carrying the header the node reports as accepted.
#[derive(Debug, Deserialize)]
pub struct AcceptedData {
    /// The accepted block's header.
    pub header: AcceptedHeader,
}

/// The header fields this endpoint needs.
#[derive(Debug, Deserialize)]
pub struct AcceptedHeader {
    /// Height of the accepted block.
    pub height: u64,
}

#[instrument(skip(state, body), fields(blockchain = %slug))]
pub async fn accepted(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<AcceptedBody>,
) -> Result<StatusCode, ApiError> {
    let blockchain = state
        .store
        .get_blockchain(&slug)
        .await
        .map_err(ApiError::App)?
        .ok_or_else(|| ApiError::App(DomainError::BlockchainNotFound(slug.clone()).into()))?;

    if state.store.is_delete_in_flight(blockchain.id).await.map_err(ApiError::App)? {
        return Ok(StatusCode::NOT_FOUND);
    }

    indexer::ingest_live_block(
        state.store.as_ref(),
        state.cache.as_ref(),
        state.node_client.as_ref(),
        &state.node_slug,
        &blockchain,
        state.publisher.as_ref(),
        Height::new(body.data.header.height),
    )
    .await
    .map_err(ApiError::App)?;

    Ok(StatusCode::OK)
}
