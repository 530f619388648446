//! Layered error types for the chain-state ingestion engine.
//!
//! - [`NodeError`] - failures talking to the upstream node's JSON-RPC surface
//! - [`DomainError`] - business logic errors (invalid state, not found, etc.)
//! - [`InfraError`] - infrastructure errors (database, config, serialization)
//! - [`AppError`] - application-level errors combining domain, infra, and node
//! - [`ApiError`] - HTTP API errors with status codes
//!
//! # Error Philosophy
//!
//! - Domain errors are recoverable and, in the few places this system has a
//!   user-facing surface, shown to callers.
//! - Infrastructure errors are logged but details hidden from users.
//! - The `Result` type alias uses `AppError` for application code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// NODE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from the upstream node's JSON-RPC surface.
///
/// `NotFound` is distinguished from `Transport`/`Unknown` because the three
/// are handled completely differently by callers: bootstrap treats
/// `NotFound` as a graceful tail-end, live ingress surfaces it as a 4xx, and
/// the reorg detector's backward walk simply stops.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NodeError {
    /// The node reported the requested height/hash/commit as missing
    /// (`result.Err == "NotFound"`).
    #[error("not found on node")]
    NotFound,

    /// A transport-level failure: connection refused, timeout, non-2xx
    /// response.
    #[error("node transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node returned a logical error other than `NotFound`.
    #[error("node returned an error for {method}: {detail}")]
    Unknown {
        /// The JSON-RPC method that was called.
        method: String,
        /// The error detail reported by the node.
        detail: String,
    },

    /// A precondition on the request itself was violated (e.g. `get_blocks`
    /// called with `limit` outside `1..=1000`).
    #[error("invalid node request: {0}")]
    InvalidRequest(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors representing business logic violations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// No blockchain exists with the given slug.
    #[error("blockchain not found: {0}")]
    BlockchainNotFound(String),

    /// An insert raced with a concurrent writer for the same natural key.
    ///
    /// Callers catch this and return the pre-existing row instead
    /// (idempotence) — it should never escape the Block Writer.
    #[error("integrity violation on {table}: {detail}")]
    IntegrityViolation {
        /// The table the violation occurred on.
        table: String,
        /// The underlying constraint detail.
        detail: String,
    },

    /// Computing the bootstrap height range or refreshing load progress
    /// failed (e.g., the node's tip could not be determined).
    #[error("failed to update blockchain progress: {0}")]
    UpdateProgressFailed(String),

    /// A `get_blocks`-style range request was out of bounds.
    #[error("invalid height range: start={start}, end={end}")]
    InvalidRange {
        /// Requested start height.
        start: u64,
        /// Requested end height.
        end: u64,
    },

    /// The reorg detector's 1,000-height cap was hit with no divergence
    /// found; detection gives up (see design notes on the cap heuristic).
    #[error("reorg detection bounds exceeded for blockchain {0}")]
    ReorgBoundsExceeded(String),

    /// A bootstrap or delete job is already in flight for this blockchain.
    #[error("a job is already in flight for blockchain {0}")]
    JobAlreadyInFlight(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
///
/// These errors are typically logged but their details are hidden from
/// users.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An internal invariant was violated (decode failure on a row that
    /// should always be well-formed, migration failure, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain, infrastructure, and node
/// errors.
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Node client error.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Configuration error surfaced at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// The worker pool is shutting down; the in-progress task should be
    /// marked `Failure("Worker shutdown")`.
    #[error("shutdown requested")]
    ShutdownRequested,

    /// The in-progress task was explicitly cancelled; it should be marked
    /// `Failure("Aborted")`.
    #[error("task aborted")]
    Aborted,
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// API ERRORS (HTTP-specific)
// ═══════════════════════════════════════════════════════════════════════════════

/// API-level errors with HTTP status codes.
///
/// These errors are converted to HTTP responses via [`IntoResponse`]. The
/// three entry points this system implements (`accepted`, `bootstrap`,
/// `bootstrap/abort`) are unauthenticated by design, so there is no 401 path
/// here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Wrapped application error.
    #[error(transparent)]
    App(#[from] AppError),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (with source for logging).
    #[error("internal error")]
    Internal(#[source] eyre::Report),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::App(AppError::Domain(DomainError::BlockchainNotFound(_))) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }

            Self::App(AppError::Node(NodeError::NotFound)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }

            Self::App(AppError::Domain(
                DomainError::InvalidRange { .. } | DomainError::JobAlreadyInFlight(_),
            ))
            | Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string()),

            // Everything else: log but don't expose details.
            Self::App(_) | Self::Internal(_) => {
                tracing::error!(error = ?self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error".into(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_display() {
        let err = DomainError::BlockchainNotFound("grin-main".into());
        assert!(err.to_string().contains("grin-main"));
    }

    #[test]
    fn app_error_from_domain() {
        let domain = DomainError::BlockchainNotFound("x".into());
        let app: AppError = domain.into();
        assert!(matches!(
            app,
            AppError::Domain(DomainError::BlockchainNotFound(_))
        ));
    }

    #[test]
    fn app_error_from_node_not_found() {
        let app: AppError = NodeError::NotFound.into();
        assert!(matches!(app, AppError::Node(NodeError::NotFound)));
    }

    #[test]
    fn api_error_maps_node_not_found_to_404() {
        let api: ApiError = AppError::from(NodeError::NotFound).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
