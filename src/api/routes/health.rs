//! Health Routes
//!
//! Health check endpoints for monitoring and container probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Uploads never wait on an external backend (rules stand in), so the
/// server is ready as soon as it answers.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
///
/// Full health status with backend details. Degraded when the default
/// backend is unavailable and uploads will fall back to rules.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backends = state.registry.status().await;
    let default_ok = backends
        .iter()
        .find(|s| s.is_default)
        .map(|s| s.available)
        .unwrap_or(false);

    Json(HealthResponse {
        status: if default_ok { "healthy" } else { "degraded" }.to_string(),
        backends,
        batches: state.store.len().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
