//! FreeMobilaChat HTTP Layer
//!
//! Dashboard pages and the JSON API, built with Axum.
//!
//! # Endpoints
//!
//! ## Dashboard
//! - `GET /` - Upload form, backend status, recent batches
//! - `POST /upload` - Multipart upload, redirects to the batch page
//! - `GET /batches/:id` - KPIs, charts and preview of one batch
//!
//! ## API
//! - `POST /api/v1/classify` - Classify a list of texts
//! - `POST /api/v1/batches` - Classify a raw CSV body
//! - `GET /api/v1/batches` - List recent batches
//! - `GET /api/v1/batches/:id` - Batch summary and KPIs
//! - `GET /api/v1/batches/:id/export` - CSV or JSON export
//! - `GET /api/v1/backends` - Backend availability
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use freemobilachat::api::{serve, AppState};
//! use freemobilachat::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(Config::load_default());
//!     serve(state).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Room for multipart boundaries and form fields on top of the file
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_size_bytes() + FORM_OVERHEAD_BYTES;
    let cors = cors_layer(&state.config.server.cors_origins);

    let api_routes = Router::new()
        .route("/classify", post(routes::classify::classify_texts))
        .route(
            "/batches",
            post(routes::batches::create_batch).get(routes::batches::list_batches),
        )
        .route("/batches/:id", get(routes::batches::get_batch))
        .route("/batches/:id/export", get(routes::batches::export_batch))
        .route("/backends", get(routes::backends::list_backends));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(routes::dashboard::index))
        .route("/upload", post(routes::dashboard::upload))
        .route("/batches/:id", get(routes::dashboard::batch_page))
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Permissive when no origin is configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    }
}

/// Start the dashboard server
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.bind_addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("FreeMobilaChat dashboard listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("FreeMobilaChat dashboard shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifierRegistry;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::util::ServiceExt;

    const SAMPLE: &str = "id,text\n\
        1,Panne fibre depuis hier urgent\n\
        2,Merci Free pour la 5G\n\
        3,Ma facture est fausse\n";

    fn create_test_app() -> Router {
        let state = AppState::with_registry(
            Config::default(),
            Arc::new(ClassifierRegistry::rules_only()),
        );
        build_router(state)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart(file_name: &str, content: &str, backend: &str) -> Request<Body> {
        let boundary = "X-FREEMOBILACHAT-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"backend\"\r\n\r\n{backend}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n{content}\r\n--{b}--\r\n",
            b = boundary,
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let response = create_test_app().oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let response = create_test_app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["backends"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_index_page() {
        let response = create_test_app().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(html.contains("<title>FreeMobilaChat - Dashboard</title>"));
        assert!(html.contains("fa-solid"));
    }

    #[tokio::test]
    async fn test_upload_redirects_to_batch() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(multipart("tweets.csv", SAMPLE, "rules"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("/batches/"));

        let page = app.oneshot(get(&location)).await.unwrap();
        assert_eq!(page.status(), StatusCode::OK);
        let html = body_string(page).await;
        assert!(html.contains("Distribution des sentiments"));
        assert!(html.contains("tweets.csv"));
    }

    #[tokio::test]
    async fn test_upload_error_rerenders_dashboard() {
        let response = create_test_app()
            .oneshot(multipart("tweets.xlsx", SAMPLE, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let html = body_string(response).await;
        assert!(html.contains("banner error"));
        assert!(html.contains("format CSV"));
    }

    #[tokio::test]
    async fn test_unknown_batch_page() {
        let response = create_test_app()
            .oneshot(get("/batches/not-a-batch"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("Introuvable"));
    }

    #[tokio::test]
    async fn test_classify_api() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/classify")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        r#"{"texts": ["Panne internet urgent", "Merci"], "backend": "llm"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["backend"], "llm");
        assert_eq!(json["fallback"], true);
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
        assert_eq!(json["results"][0]["backend"], "rules");
    }

    #[tokio::test]
    async fn test_classify_rejects_empty_and_unknown_backend() {
        let app = create_test_app();

        let empty = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/classify")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"texts": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(empty).await["error"]["code"], "VALIDATION_ERROR");

        let unknown = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/classify")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"texts": ["x"], "backend": "gpt"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_api_lifecycle() {
        let app = create_test_app();

        let created = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/batches?file_name=mai.csv&backend=rules")
                    .header("Content-Type", "text/csv")
                    .body(Body::from(SAMPLE))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let summary = body_json(created).await;
        assert_eq!(summary["total"], 3);
        let id = summary["id"].as_str().unwrap().to_string();

        let list = app.clone().oneshot(get("/api/v1/batches")).await.unwrap();
        assert_eq!(body_json(list).await["total"], 1);

        let detail = app
            .clone()
            .oneshot(get(&format!("/api/v1/batches/{}", id)))
            .await
            .unwrap();
        let detail = body_json(detail).await;
        assert_eq!(detail["file_name"], "mai.csv");
        assert_eq!(detail["kpis"]["total"], 3);

        let export = app
            .clone()
            .oneshot(get(&format!("/api/v1/batches/{}/export?format=csv", id)))
            .await
            .unwrap();
        assert_eq!(export.status(), StatusCode::OK);
        assert_eq!(
            export.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"mai_classified.csv\""
        );
        let csv = body_string(export).await;
        assert!(csv.starts_with("row,text,cleaned,sentiment"));
        assert_eq!(csv.lines().count(), 4);

        let json = app
            .oneshot(get(&format!("/api/v1/batches/{}/export?format=json", id)))
            .await
            .unwrap();
        assert_eq!(body_json(json).await.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_batch_api_errors() {
        let app = create_test_app();

        let missing = app
            .clone()
            .oneshot(get("/api/v1/batches/8f2a6c1e-0000-4000-8000-000000000000"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await["error"]["code"], "NOT_FOUND");

        let no_headers = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/batches")
                    .body(Body::from("   \n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(no_headers.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(no_headers).await["error"]["code"], "CSV_ERROR");

        let empty = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/batches")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backends_api() {
        let response = create_test_app().oneshot(get("/api/v1/backends")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["default_backend"], "rules");
        assert_eq!(json["backends"][2]["available"], true);
        assert_eq!(json["backends"][0]["available"], false);
    }
}
