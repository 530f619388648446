//! Thin HTTP entry points that drive the ingestion core.
//!
//! Per the system's scope (§1), the only endpoints implemented here are the
//! three that exist purely to trigger the core engine — `accepted`,
//! `bootstrap`, `bootstrap/abort` — plus a liveness check. They contain no
//! business logic beyond deserializing the request and calling into
//! [`crate::indexer`]; the full block-listing/search REST surface is out of
//! scope.

mod accepted;
mod bootstrap;
mod health;
mod state;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the application's Axum router.
#[must_use]
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/healthz", get(health::health))
        .route("/api/blockchains/:slug/accepted", post(accepted::accepted))
        .route("/api/blockchains/:slug/bootstrap", post(bootstrap::start_bootstrap))
        .route("/api/blockchains/:slug/bootstrap/abort", post(bootstrap::abort_bootstrap))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(TimeoutLayer::new(request_timeout)))
        .with_state(state)
}
