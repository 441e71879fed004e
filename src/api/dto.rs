//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};

use crate::batch::BatchSummary;
use crate::classify::{BackendStatus, Classification};
use crate::kpi::KpiReport;

// ============================================
// CLASSIFY DTOs
// ============================================

/// Direct classification request
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub texts: Vec<String>,
    /// Backend name, registry default when absent
    #[serde(default)]
    pub backend: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    /// Backend that was requested
    pub backend: String,
    pub results: Vec<Classification>,
    pub fallback: bool,
    pub fallback_count: usize,
}

// ============================================
// BATCH DTOs
// ============================================

/// Query parameters of `POST /api/v1/batches`
#[derive(Debug, Default, Deserialize)]
pub struct CreateBatchParams {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub text_column: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchListResponse {
    pub batches: Vec<BatchSummary>,
    pub total: usize,
}

/// One batch with its indicators
#[derive(Debug, Serialize)]
pub struct BatchDetailResponse {
    #[serde(flatten)]
    pub summary: BatchSummary,
    pub kpis: KpiReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Export query parameters
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// csv or json
    #[serde(default = "default_export_format")]
    pub format: String,
}

fn default_export_format() -> String {
    "csv".to_string()
}

// ============================================
// BACKEND / HEALTH DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct BackendsResponse {
    pub default_backend: String,
    pub backends: Vec<BackendStatus>,
}

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded"
    pub status: String,
    pub backends: Vec<BackendStatus>,
    pub batches: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
