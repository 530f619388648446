//! Liveness check.

use axum::http::StatusCode;

/// Always returns `200 OK` once the process is serving requests.
pub async fn health() -> StatusCode {
    StatusCode::OK
}
