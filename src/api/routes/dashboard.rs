//! Dashboard Routes
//!
//! HTML pages served to the browser.
//!
//! - GET / - Dashboard home
//! - POST /upload - Multipart CSV upload, redirects to the batch page
//! - GET /batches/:id - Batch page

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::batches::find_batch;
use super::parse_backend;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::batch::{BatchSummary, PipelineError, Upload};
use crate::dashboard::{self, IndexView, Notice};
use crate::ingest::IngestError;

/// What the user can do about a rejected upload
pub fn remediation_hint(error: &IngestError) -> &'static str {
    match error {
        IngestError::EmptyFile => "Vérifiez que le fichier contient des données.",
        IngestError::TooLarge { .. } => {
            "Découpez le fichier ou augmentez upload.max_size_mb dans la configuration."
        }
        IngestError::UnsupportedExtension(_) => "Exportez vos données au format CSV (.csv).",
        IngestError::Encoding => "Enregistrez le fichier en UTF-8.",
        IngestError::NoHeaders => "La première ligne doit contenir les noms de colonnes.",
        IngestError::MissingColumn { .. } => {
            "Laissez le champ colonne vide pour la détecter automatiquement."
        }
        IngestError::NoRecords => {
            "Vérifiez le séparateur (virgule ou point-virgule) et la colonne texte."
        }
        IngestError::Io(_) | IngestError::Csv(_) => "Vérifiez que le fichier est un CSV valide.",
    }
}

async fn index_html(state: &AppState, notice: Option<Notice>) -> String {
    let statuses = state.registry.status().await;
    let batches = state.store.list().await;
    let summaries: Vec<BatchSummary> = batches.iter().map(|b| b.summary()).collect();

    dashboard::render_index(&IndexView {
        statuses: &statuses,
        batches: &summaries,
        latest: batches.first().map(|b| b.as_ref()),
        default_backend: state.registry.default_backend(),
        max_size_mb: state.config.upload.max_size_mb,
        notice,
    })
}

/// GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(index_html(&state, None).await)
}

/// POST /upload
pub async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err((error, hint)) => return upload_error(&state, error, hint).await,
    };

    match state.pipeline.run(upload).await {
        Ok(batch) => {
            let batch = state.store.insert(batch).await;
            Redirect::to(&format!("/batches/{}", batch.id)).into_response()
        }
        Err(e) => {
            let PipelineError::Ingest(ingest) = &e;
            let hint = Some(remediation_hint(ingest).to_string());
            upload_error(&state, e.into(), hint).await
        }
    }
}

async fn upload_error(state: &AppState, error: ApiError, hint: Option<String>) -> Response {
    tracing::warn!(error = %error, "Upload rejected");
    let message = match &error {
        ApiError::Validation(m) | ApiError::Csv(m) => m.clone(),
        other => other.to_string(),
    };
    let html = index_html(state, Some(Notice::error(message, hint))).await;
    (error.status(), Html(html)).into_response()
}

type UploadError = (ApiError, Option<String>);

async fn read_upload(mut multipart: Multipart) -> Result<Upload, UploadError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut backend = None;
    let mut text_column = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err((
                    ApiError::Validation(format!("Invalid form data: {}", e)),
                    Some("Le fichier dépasse peut-être la taille maximale.".to_string()),
                ))
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (ApiError::Validation(format!("Failed to read file: {}", e)), None)
                })?;
                file = Some((file_name, bytes.to_vec()));
            }
            "backend" => {
                let value = field.text().await.unwrap_or_default();
                backend = parse_backend(Some(&value)).map_err(|e| (e, None))?;
            }
            "text_column" => {
                let value = field.text().await.unwrap_or_default();
                let value = value.trim();
                if !value.is_empty() {
                    text_column = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| {
        (
            ApiError::Validation("No file uploaded".to_string()),
            Some("Choisissez un fichier CSV avant de lancer l'analyse.".to_string()),
        )
    })?;

    Ok(Upload {
        file_name,
        bytes,
        backend,
        text_column,
    })
}

/// GET /batches/:id
pub async fn batch_page(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match find_batch(&state, &id).await {
        Ok(batch) => Html(dashboard::render_batch(
            &batch,
            state.config.upload.preview_rows,
        ))
        .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Html(dashboard::render_not_found(&format!(
                "Aucune analyse avec l'identifiant {}.",
                id
            ))),
        )
            .into_response(),
    }
}
