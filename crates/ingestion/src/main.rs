//! iPDF Ingestion
//!
//! Indexes extractor output into the vector collection:
//! 1. Loads one JSON file per document
//! 2. Chunks text, tables and images
//! 3. Embeds chunks in batches
//! 4. Upserts points into Qdrant
//!
//! Prints the ingestion report as JSON and exits with status 1 when any
//! document failed.

use anyhow::Context;
use clap::Parser;
use ipdf_common::{config::AppConfig, telemetry, PipelineContext, VERSION};
use ipdf_ingestion::{loader, Chunker, IngestionProcessor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about = "Index extracted documents for retrieval")]
struct Cli {
    /// Configuration file (defaults to config/default + config/{APP_ENV})
    #[arg(short, long, env = "IPDF_CONFIG")]
    config: Option<String>,

    /// Documents processed in parallel (overrides ingestion.concurrency)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Delete each document's existing points before indexing it
    #[arg(long)]
    replace: bool,

    /// Extractor output files or directories of them
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(concurrency) = cli.concurrency {
        config.ingestion.concurrency = concurrency;
    }

    // Initialize tracing
    telemetry::init_tracing(&config.observability);
    telemetry::install_metrics_exporter(&config.observability)?;

    info!("Starting iPDF Ingestion v{}", VERSION);

    let files = loader::discover(&cli.paths)?;

    let ctx = Arc::new(PipelineContext::from_config(&config)?);
    let chunker = Chunker::from_settings(&config.chunking)?;
    let processor = IngestionProcessor::new(ctx, chunker, config.ingestion.concurrency)
        .with_replace(cli.replace);

    let report = processor.ingest_files(files).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
