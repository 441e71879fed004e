//! FreeMobilaChat CLI
//!
//! Command-line interface for FreeMobilaChat operations:
//! - Classify a CSV file offline
//! - Check backend availability
//! - Smoke-test a running dashboard
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use freemobilachat::batch::{Batch, Pipeline, Upload};
use freemobilachat::classify::{Backend, ClassifierRegistry};
use freemobilachat::config::{generate_default_config, Config};
use freemobilachat::ingest::TextCleaner;
use freemobilachat::labels::claim_str;
use freemobilachat::smoke::{self, run_smoke};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "freemobilachat-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Classify customer messages and check the FreeMobilaChat dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify the messages of a CSV file
    Classify {
        /// Path to CSV file
        path: PathBuf,
        /// Backend (llm, bert, rules); config default when omitted
        #[arg(short, long)]
        backend: Option<Backend>,
        /// Column holding the message text
        #[arg(short, long)]
        text_column: Option<String>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show classifier backend availability
    Backends,

    /// Check that a running dashboard answers with HTTP 200
    Smoke {
        /// Dashboard URL
        #[arg(long, default_value = smoke::DEFAULT_URL)]
        url: String,
        /// Request timeout in milliseconds
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Fallback warnings go to stderr so stdout stays clean for json/csv
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freemobilachat=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let load_config = || -> anyhow::Result<Config> {
        Ok(match &cli.config {
            Some(path) => Config::load_with_env(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::load_default(),
        })
    };

    match &cli.command {
        Commands::Classify {
            path,
            backend,
            text_column,
            format,
            output,
        } => {
            if !path.exists() {
                bail!("File not found: {}", path.display());
            }
            let config = load_config()?;
            let registry = Arc::new(ClassifierRegistry::from_config(&config));
            let cleaner = TextCleaner::from_config(&config.classifier);
            let pipeline = Pipeline::new(registry, cleaner, config.upload.max_size_bytes());

            let bytes = std::fs::read(path)?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.csv")
                .to_string();

            let batch = pipeline
                .run(Upload {
                    file_name,
                    bytes,
                    backend: *backend,
                    text_column: text_column.clone(),
                })
                .await?;

            let rendered = match format.as_str() {
                "json" => serde_json::to_string_pretty(&batch.export_rows())?,
                "csv" => batch.to_csv()?,
                "table" => render_table(&batch),
                other => bail!("Unknown format '{}': use table, json or csv", other),
            };

            match output {
                Some(out) => {
                    std::fs::write(out, rendered)?;
                    println!(
                        "Classified {} messages into {:?}",
                        batch.records.len(),
                        out
                    );
                }
                None => print!("{}", rendered),
            }
        }

        Commands::Backends => {
            let config = load_config()?;
            let registry = ClassifierRegistry::from_config(&config);

            println!("{:<8} {:<12} {:<8} {}", "Backend", "Status", "Default", "Detail");
            println!("{}", "-".repeat(70));
            for status in registry.status().await {
                println!(
                    "{:<8} {:<12} {:<8} {}",
                    status.label,
                    if status.available { "available" } else { "unavailable" },
                    if status.is_default { "yes" } else { "" },
                    status.detail
                );
            }
        }

        Commands::Smoke { url, timeout_ms } => {
            let report = run_smoke(url, Duration::from_millis(*timeout_ms)).await?;
            println!("Dashboard OK at {}", report.url);
            println!("  Status: {}", report.status);
            println!(
                "  Title: {}",
                report.title.as_deref().unwrap_or("(none)")
            );
            println!("  Icons: {}", report.icon_count);
            println!("  Time: {} ms", report.elapsed_ms);
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            if let Some(path) = output {
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            } else {
                print!("{}", config);
            }
        }
    }

    Ok(())
}

fn render_table(batch: &Batch) -> String {
    let mut out = String::new();
    let k = &batch.kpis;

    out.push_str(&format!(
        "{} - {} messages, backend {}\n",
        batch.file_name,
        k.total,
        batch.backend.label()
    ));
    out.push_str(&format!(
        "Claims: {} ({:.1}%)  Negative: {} ({:.1}%)  Urgent: {} ({:.1}%)  Avg confidence: {:.2}  Satisfaction: {:.0}/100\n",
        k.claims,
        k.claim_percent,
        k.negatives,
        k.negative_percent,
        k.urgent,
        k.urgent_percent,
        k.confidence_avg,
        k.satisfaction_index
    ));
    if batch.fallback_count > 0 {
        out.push_str(&format!(
            "Rules fallback: {} messages\n",
            batch.fallback_count
        ));
    }
    if batch.rows_failed > 0 {
        out.push_str(&format!("Skipped rows: {}\n", batch.rows_failed));
    }
    out.push('\n');

    out.push_str(&format!(
        "{:<6} {:<9} {:<6} {:<8} {:<14} {:<5} {}\n",
        "Row", "Sentiment", "Claim", "Urgency", "Topic", "Conf", "Text"
    ));
    out.push_str(&format!("{}\n", "-".repeat(90)));
    for (record, c) in batch.rows() {
        out.push_str(&format!(
            "{:<6} {:<9} {:<6} {:<8} {:<14} {:<5.2} {}\n",
            record.row,
            c.sentiment.as_str(),
            claim_str(c.is_claim),
            c.urgency.as_str(),
            c.topic.as_str(),
            c.confidence,
            truncate(&record.text, 40)
        ));
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars - 1).collect();
        format!("{}…", cut)
    }
}
