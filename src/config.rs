//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::{Backend, LlmProvider};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub bert: BertConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8502
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Backend selection and text cleaning
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_backend")]
    pub default_backend: Backend,

    #[serde(default = "default_true")]
    pub remove_urls: bool,

    #[serde(default = "default_true")]
    pub remove_mentions: bool,

    #[serde(default)]
    pub remove_hashtags: bool,

    #[serde(default = "default_true")]
    pub lowercase: bool,

    #[serde(default = "default_true")]
    pub fold_accents: bool,

    /// Re-append telecom terms that cleaning removed
    #[serde(default = "default_true")]
    pub preserve_domain_keywords: bool,

    #[serde(default)]
    pub extra_stopwords: Vec<String>,
}

fn default_backend() -> Backend {
    Backend::Rules
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            remove_urls: true,
            remove_mentions: true,
            remove_hashtags: false,
            lowercase: true,
            fold_accents: true,
            preserve_domain_keywords: true,
            extra_stopwords: Vec::new(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub provider: LlmProvider,

    /// Provider default when unset
    pub base_url: Option<String>,

    /// Provider default when unset
    pub model: Option<String>,

    /// Gemini only
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_llm_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,

    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout of the availability probe behind the dashboard and `/health`
    #[serde(default = "default_health_timeout")]
    pub health_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_output_tokens() -> u32 {
    2000
}

fn default_llm_batch_size() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_inter_batch_delay() -> u64 {
    500
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_health_timeout() -> u64 {
    2000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::default(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            batch_size: default_llm_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            inter_batch_delay_ms: default_inter_batch_delay(),
            request_timeout_secs: default_llm_timeout(),
            health_timeout_ms: default_health_timeout(),
        }
    }
}

/// BERT model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BertConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory with config.json, tokenizer.json and model.safetensors
    pub model_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub use_cpu: bool,

    #[serde(default = "default_bert_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_bert_batch_size() -> usize {
    32
}

fn default_max_length() -> usize {
    512
}

impl Default for BertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_dir: None,
            use_cpu: true,
            batch_size: default_bert_batch_size(),
            max_length: default_max_length(),
        }
    }
}

/// Upload limits and batch retention
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    #[serde(default = "default_max_batches")]
    pub max_batches: usize,

    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_max_size_mb() -> u64 {
    50
}

fn default_max_batches() -> usize {
    20
}

fn default_preview_rows() -> usize {
    100
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> usize {
        (self.max_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
            max_batches: default_max_batches(),
            preview_rows: default_preview_rows(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths: Vec<PathBuf> = [
            Some(PathBuf::from("./config.toml")),
            dirs::config_dir().map(|p| p.join("freemobilachat").join("config.toml")),
            Some(PathBuf::from("/etc/freemobilachat/config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first existing file that parses, or fall back to the environment
    pub fn load_first(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup
    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = var("FREEMOBILACHAT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("FREEMOBILACHAT_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Some(backend) = var("FREEMOBILACHAT_BACKEND") {
            match backend.parse() {
                Ok(b) => self.classifier.default_backend = b,
                Err(e) => tracing::warn!("Ignoring FREEMOBILACHAT_BACKEND: {}", e),
            }
        }

        // LLM overrides
        if let Some(provider) = var("FREEMOBILACHAT_LLM_PROVIDER") {
            match provider.parse() {
                Ok(p) => self.llm.provider = p,
                Err(e) => tracing::warn!("Ignoring FREEMOBILACHAT_LLM_PROVIDER: {}", e),
            }
        }
        if let Some(url) = var("OLLAMA_BASE_URL") {
            if self.llm.provider == LlmProvider::Ollama {
                self.llm.base_url = Some(url);
            }
        }
        if let Some(model) = var("FREEMOBILACHAT_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(key) = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")) {
            self.llm.api_key = Some(key);
        }

        if let Some(dir) = var("FREEMOBILACHAT_BERT_MODEL_DIR") {
            self.bert.model_dir = Some(PathBuf::from(dir));
        }

        // Logging overrides
        if let Some(level) = var("FREEMOBILACHAT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("FREEMOBILACHAT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Socket address string for the dashboard server
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# FreeMobilaChat Configuration
#
# Environment variables override these settings:
# - FREEMOBILACHAT_HOST
# - FREEMOBILACHAT_PORT
# - FREEMOBILACHAT_BACKEND
# - FREEMOBILACHAT_LLM_PROVIDER
# - OLLAMA_BASE_URL
# - FREEMOBILACHAT_LLM_MODEL
# - GEMINI_API_KEY / GOOGLE_API_KEY
# - FREEMOBILACHAT_BERT_MODEL_DIR
# - FREEMOBILACHAT_LOG_LEVEL
# - FREEMOBILACHAT_LOG_FORMAT

[server]
# Dashboard host
host = "0.0.0.0"

# Dashboard port
port = 8502

# Allowed CORS origins for the JSON API (empty = any)
cors_origins = []

[classifier]
# Backend used when none is selected: llm, bert or rules
default_backend = "rules"

# Text cleaning steps
remove_urls = true
remove_mentions = true
remove_hashtags = false
lowercase = true
fold_accents = true

# Re-append telecom terms (fibre, débit, ...) that cleaning removed
preserve_domain_keywords = true

# Words removed from cleaned text
extra_stopwords = []

[llm]
# Enable the LLM backend
enabled = true

# Provider: ollama or gemini
provider = "ollama"

# Provider URL (default http://localhost:11434 for Ollama)
# base_url = "http://localhost:11434"

# Model name (default mistral / gemini-1.5-flash)
# model = "mistral"

# Generation options
temperature = 0.1
top_p = 0.9
max_output_tokens = 2000

# Messages per request
batch_size = 50

# Attempts per request before falling back to rules
max_retries = 3
retry_delay_ms = 2000

# Pause between requests (ms)
inter_batch_delay_ms = 500

# Request timeout in seconds
request_timeout_secs = 120

# Availability probe timeout (ms), keeps the dashboard responsive
health_timeout_ms = 2000

[bert]
# Enable the BERT backend (requires the `bert` build feature)
enabled = true

# Directory with config.json, tokenizer.json and model.safetensors
# model_dir = "/opt/models/bert-base-multilingual-uncased-sentiment"

use_cpu = true
batch_size = 32
max_length = 512

[upload]
# Maximum upload size in MB
max_size_mb = 50

# Batches kept in memory
max_batches = 20

# Rows shown in the preview table
preview_rows = 100

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8502);
        assert_eq!(config.classifier.default_backend, Backend::Rules);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.batch_size, 50);
        assert_eq!(config.upload.max_batches, 20);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [llm]
            provider = "gemini"
            max_retries = 1

            [classifier]
            default_backend = "llm"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.max_retries, 1);
        assert_eq!(config.llm.retry_delay_ms, 2000);
        assert_eq!(config.classifier.default_backend, Backend::Llm);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.upload.max_size_bytes(), 50 * 1024 * 1024);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("FREEMOBILACHAT_HOST", "127.0.0.1"),
            ("FREEMOBILACHAT_PORT", "9100"),
            ("FREEMOBILACHAT_BACKEND", "llm"),
            ("OLLAMA_BASE_URL", "http://ollama:11434"),
            ("FREEMOBILACHAT_LLM_MODEL", "mistral:7b"),
            ("FREEMOBILACHAT_BERT_MODEL_DIR", "/opt/bert"),
            ("FREEMOBILACHAT_LOG_FORMAT", "json"),
        ]));

        assert_eq!(config.bind_addr(), "127.0.0.1:9100");
        assert_eq!(config.classifier.default_backend, Backend::Llm);
        assert_eq!(config.llm.base_url.as_deref(), Some("http://ollama:11434"));
        assert_eq!(config.llm.model.as_deref(), Some("mistral:7b"));
        assert_eq!(config.bert.model_dir, Some(PathBuf::from("/opt/bert")));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("FREEMOBILACHAT_PORT", "not-a-port"),
            ("FREEMOBILACHAT_BACKEND", "gpt"),
            ("FREEMOBILACHAT_LLM_PROVIDER", "openai"),
        ]));

        assert_eq!(config.server.port, 8502);
        assert_eq!(config.classifier.default_backend, Backend::Rules);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
    }

    #[test]
    fn test_gemini_key_fallback() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("FREEMOBILACHAT_LLM_PROVIDER", "gemini"),
            ("GOOGLE_API_KEY", "google-key"),
            ("OLLAMA_BASE_URL", "http://ollama:11434"),
        ]));
        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.api_key.as_deref(), Some("google-key"));
        // Ollama URL only applies to the Ollama provider
        assert_eq!(config.llm.base_url, None);

        config.apply_overrides(vars(&[
            ("GEMINI_API_KEY", "gemini-key"),
            ("GOOGLE_API_KEY", "google-key"),
        ]));
        assert_eq!(config.llm.api_key.as_deref(), Some("gemini-key"));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_malformed_file_is_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&bad, "[server\nport = ").unwrap();
        std::fs::write(&good, "[server]\nport = 9200\n").unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let config = tracing::subscriber::with_default(subscriber, || {
            Config::load_first(&[dir.path().join("missing.toml"), bad.clone(), good.clone()])
        });

        assert_eq!(config.server.port, 9200);
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Failed to load config"), "{}", output);
        assert!(output.contains("bad.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.port, 9000);

        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
