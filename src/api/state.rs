//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::batch::{BatchStore, Pipeline};
use crate::classify::ClassifierRegistry;
use crate::config::Config;
use crate::ingest::TextCleaner;

/// Shared application state for all handlers
pub struct AppState {
    pub config: Arc<Config>,
    /// Configured classifier backends
    pub registry: Arc<ClassifierRegistry>,
    pub pipeline: Pipeline,
    /// Recent batches, newest last
    pub store: BatchStore,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Build the registry from the configuration
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(ClassifierRegistry::from_config(&config));
        Self::with_registry(config, registry)
    }

    /// Use an already built registry
    pub fn with_registry(config: Config, registry: Arc<ClassifierRegistry>) -> Self {
        let pipeline = Pipeline::new(
            Arc::clone(&registry),
            TextCleaner::from_config(&config.classifier),
            config.upload.max_size_bytes(),
        );
        let store = BatchStore::new(config.upload.max_batches);

        Self {
            config: Arc::new(config),
            registry,
            pipeline,
            store,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
