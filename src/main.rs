//! FreeMobilaChat Dashboard Server
//!
//! Run with: cargo run --bin freemobilachat
//!
//! # Configuration
//!
//! Read from `--config`, or the first of `./config.toml`,
//! `$XDG_CONFIG_HOME/freemobilachat/config.toml` and
//! `/etc/freemobilachat/config.toml`. Environment variables override the file:
//! - `FREEMOBILACHAT_HOST`, `FREEMOBILACHAT_PORT`: Bind address (default: 0.0.0.0:8502)
//! - `FREEMOBILACHAT_BACKEND`: Default backend (llm, bert, rules)
//! - `FREEMOBILACHAT_LLM_PROVIDER`, `OLLAMA_BASE_URL`, `FREEMOBILACHAT_LLM_MODEL`
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY`
//! - `FREEMOBILACHAT_BERT_MODEL_DIR`
//! - `FREEMOBILACHAT_LOG_LEVEL`, `FREEMOBILACHAT_LOG_FORMAT` (pretty, json)
//! - `RUST_LOG`: Full filter, takes precedence over the log level

use anyhow::Context;
use clap::Parser;
use freemobilachat::api::{serve, AppState};
use freemobilachat::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "freemobilachat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer message classification dashboard")]
struct Args {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config warnings are emitted before the configured subscriber exists
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freemobilachat=info".into()),
        )
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(Config::load_default()),
    })?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging);

    tracing::info!("Starting FreeMobilaChat v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        default_backend = %config.classifier.default_backend,
        llm_enabled = config.llm.enabled,
        bert_enabled = config.bert.enabled,
        "Configuration loaded"
    );

    let state = AppState::new(config);
    for status in state.registry.status().await {
        if status.available {
            tracing::info!(backend = %status.backend, detail = %status.detail, "Backend available");
        } else {
            tracing::warn!(
                backend = %status.backend,
                detail = %status.detail,
                "Backend unavailable, rules will be used instead"
            );
        }
    }

    serve(state).await?;

    tracing::info!("FreeMobilaChat stopped");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "freemobilachat={level},tower_http={level}",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
