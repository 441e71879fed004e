//! Batch Routes
//!
//! - POST /api/v1/batches - Classify a raw CSV body
//! - GET /api/v1/batches - List recent batches
//! - GET /api/v1/batches/:id - Batch summary and KPIs
//! - GET /api/v1/batches/:id/export - Download the classified rows

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::parse_backend;
use crate::api::dto::{BatchDetailResponse, BatchListResponse, CreateBatchParams, ExportParams};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::batch::{Batch, BatchSummary, Upload};

/// POST /api/v1/batches
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreateBatchParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<BatchSummary>)> {
    let backend = parse_backend(params.backend.as_deref())?;
    let upload = Upload {
        file_name: params
            .file_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "upload.csv".to_string()),
        bytes: body.to_vec(),
        backend,
        text_column: params.text_column.filter(|c| !c.trim().is_empty()),
    };

    let batch = state.pipeline.run(upload).await?;
    let batch = state.store.insert(batch).await;

    Ok((StatusCode::CREATED, Json(batch.summary())))
}

/// GET /api/v1/batches
pub async fn list_batches(State(state): State<Arc<AppState>>) -> Json<BatchListResponse> {
    let batches: Vec<BatchSummary> = state.store.list().await.iter().map(|b| b.summary()).collect();
    Json(BatchListResponse {
        total: batches.len(),
        batches,
    })
}

/// GET /api/v1/batches/:id
pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<BatchDetailResponse>> {
    let batch = find_batch(&state, &id).await?;
    Ok(Json(BatchDetailResponse {
        summary: batch.summary(),
        kpis: batch.kpis.clone(),
        errors: batch.errors.clone(),
    }))
}

/// GET /api/v1/batches/:id/export?format=csv|json
pub async fn export_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let batch = find_batch(&state, &id).await?;

    let format = params.format.to_lowercase();
    let (content_type, extension, body) = match format.as_str() {
        "csv" => {
            let csv = batch
                .to_csv()
                .map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))?;
            ("text/csv; charset=utf-8", "csv", csv)
        }
        "json" => {
            let json = serde_json::to_string_pretty(&batch.export_rows())
                .map_err(|e| ApiError::Internal(format!("JSON export failed: {}", e)))?;
            ("application/json", "json", json)
        }
        other => {
            return Err(ApiError::Validation(format!(
                "Unknown export format '{}': use csv or json",
                other
            )))
        }
    };

    let filename = format!("{}_classified.{}", file_stem(&batch.file_name), extension);
    tracing::debug!(batch_id = %batch.id, format = %extension, "Exporting batch");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(body),
    )
        .into_response())
}

pub(crate) async fn find_batch(state: &AppState, id: &str) -> ApiResult<Arc<Batch>> {
    let uuid = Uuid::parse_str(id)
        .map_err(|_| ApiError::NotFound(format!("Batch '{}'", id)))?;
    state
        .store
        .get(uuid)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Batch '{}'", id)))
}

/// File name without extension, restricted to header-safe characters
fn file_stem(file_name: &str) -> String {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("batch");
    let safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "batch".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("tweets.csv"), "tweets");
        assert_eq!(file_stem("réclamations mai.csv"), "r_clamations_mai");
        assert_eq!(file_stem(""), "batch");
    }
}
