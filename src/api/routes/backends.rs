//! Backend Routes
//!
//! - GET /api/v1/backends - Availability of each classifier backend

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::BackendsResponse;
use crate::api::state::AppState;

/// GET /api/v1/backends
pub async fn list_backends(State(state): State<Arc<AppState>>) -> Json<BackendsResponse> {
    Json(BackendsResponse {
        default_backend: state.registry.default_backend().to_string(),
        backends: state.registry.status().await,
    })
}
