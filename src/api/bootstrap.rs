//! `POST /api/blockchains/{slug}/bootstrap` and `.../bootstrap/abort`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ApiError, DomainError};
use crate::types::entities::IngestionTask;
use crate::types::primitives::Height;

use super::state::AppState;

/// Optional bounds for the backfill range; defaults to `[0, tip]`.
///
/// Every field defaults, so callers may `POST` an empty JSON object `{}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapRequest {
    /// Lowest height to backfill. Defaults to 0.
    pub start_height: Option<u64>,
    /// Highest height to backfill. Defaults to the node's current tip.
    pub end_height: Option<u64>,
    /// Skip the per-height reorg check during this run.
    pub skip_reorg_check: bool,
}

/// The task envelope returned to callers.
#[derive(Debug, Serialize)]
pub struct TaskEnvelope {
    /// Task primary key.
    pub id: uuid::Uuid,
    /// Current lifecycle status.
    pub status: crate::types::enums::TaskStatus,
}

impl From<IngestionTask> for TaskEnvelope {
    fn from(task: IngestionTask) -> Self {
        Self { id: task.id, status: task.status }
    }
}

#[instrument(skip(state, body), fields(blockchain = %slug))]
pub async fn start_bootstrap(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<BootstrapRequest>,
) -> Result<Json<TaskEnvelope>, ApiError> {
    let blockchain = state
        .store
        .get_blockchain(&slug)
        .await
        .map_err(ApiError::App)?
        .ok_or_else(|| ApiError::App(DomainError::BlockchainNotFound(slug.clone()).into()))?;

    let end_height = match request.end_height {
        Some(height) => Height::new(height),
        None => state.node_client.get_tip().await.map_err(|e| ApiError::App(e.into()))?.height,
    };
    let start_height = Height::new(request.start_height.unwrap_or(0));

    let task = state
        .supervisor
        .spawn_bootstrap(
            state.store.clone(),
            state.cache.clone(),
            state.node_client.clone(),
            state.node_slug.to_string(),
            blockchain,
            start_height,
            end_height,
            request.skip_reorg_check,
            (*state.ingestion_settings).clone(),
            state.publisher.clone(),
        )
        .await;

    Ok(Json(task.into()))
}

#[instrument(skip(state), fields(blockchain = %slug))]
pub async fn abort_bootstrap(State(state): State<AppState>, Path(slug): Path<String>) -> Result<StatusCode, ApiError> {
    let blockchain = state
        .store
        .get_blockchain(&slug)
        .await
        .map_err(ApiError::App)?
        .ok_or_else(|| ApiError::App(DomainError::BlockchainNotFound(slug.clone()).into()))?;

    state.supervisor.abort_for(&blockchain.slug).await;
    Ok(StatusCode::OK)
}
