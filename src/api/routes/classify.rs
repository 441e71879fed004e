//! Classify Routes
//!
//! - POST /api/v1/classify - Classify a list of texts directly

use axum::{extract::State, Json};
use std::sync::Arc;

use super::parse_backend;
use crate::api::dto::{ClassifyRequest, ClassifyResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// Maximum number of texts per request
pub const MAX_TEXTS: usize = 1000;

/// POST /api/v1/classify
///
/// Texts are classified as given, without the upload cleaning step.
pub async fn classify_texts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> ApiResult<Json<ClassifyResponse>> {
    if req.texts.is_empty() {
        return Err(ApiError::Validation("texts must not be empty".to_string()));
    }
    if req.texts.len() > MAX_TEXTS {
        return Err(ApiError::Validation(format!(
            "Too many texts: {} (max {})",
            req.texts.len(),
            MAX_TEXTS
        )));
    }

    let backend = parse_backend(req.backend.as_deref())?;
    let outcome = state.registry.classify(backend, &req.texts).await;

    Ok(Json(ClassifyResponse {
        backend: outcome.requested.to_string(),
        results: outcome.results,
        fallback: outcome.fallback,
        fallback_count: outcome.fallback_count,
    }))
}
