//! # FreeMobilaChat
//!
//! Customer message classification dashboard. Uploaded CSV files of customer
//! messages are cleaned, classified (sentiment, claim, urgency, topic,
//! incident) by an LLM, a BERT model or keyword rules, and summarised as KPIs
//! and charts.
//!
//! ## Modules
//!
//! - [`labels`]: Fixed label sets and their normalization
//! - [`ingest`]: CSV upload reading and text cleaning
//! - [`classify`]: Classifier backends and the fallback registry
//! - [`kpi`]: Aggregated indicators for a batch
//! - [`batch`]: Upload pipeline and in-memory batch store
//! - [`dashboard`]: Server-rendered HTML pages and SVG charts
//! - [`api`]: HTTP server with Axum
//! - [`smoke`]: Smoke check against a running dashboard
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use freemobilachat::classify::{Backend, ClassifierRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ClassifierRegistry::rules_only();
//!     let texts = vec!["Panne fibre depuis 3 jours, c'est urgent".to_string()];
//!
//!     let outcome = registry.classify(Some(Backend::Rules), &texts).await;
//!     let result = &outcome.results[0];
//!
//!     println!("{} {} {}", result.sentiment, result.urgency, result.topic);
//! }
//! ```

pub mod api;
pub mod batch;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod kpi;
pub mod labels;
pub mod smoke;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, AppState};

pub use batch::{Batch, BatchStore, BatchSummary, Pipeline, PipelineError, Upload};

pub use classify::{
    Backend, BackendStatus, Classification, ClassificationOutcome, Classifier,
    ClassifierRegistry, ClassifyError,
};

pub use config::{Config, ConfigError};

pub use ingest::{CsvReader, IngestError, Record, TextCleaner};

pub use kpi::KpiReport;

pub use labels::{Category, Incident, Sentiment, Topic, Urgency};

pub use smoke::{run_smoke, SmokeError, SmokeReport};
