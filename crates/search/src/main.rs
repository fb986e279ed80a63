//! iPDF Search
//!
//! Answers one query against the indexed collection and prints the
//! citation-annotated context for the generation step:
//! - Vector similarity search (Qdrant)
//! - Score threshold with raw-candidate fallback
//! - Near-duplicate suppression

use anyhow::Context;
use clap::Parser;
use ipdf_common::{config::AppConfig, telemetry, ContextAssembler, PipelineContext, VERSION};
use ipdf_search::{QueryEngine, SearchRequest, SearchResponse};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "search", version, about = "Search indexed documents and print context")]
struct Cli {
    /// Configuration file (defaults to config/default + config/{APP_ENV})
    #[arg(short, long, env = "IPDF_CONFIG")]
    config: Option<String>,

    /// Maximum results (overrides search.default_limit)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Only search this source document
    #[arg(short, long)]
    document: Option<String>,

    /// Minimum relevance score (overrides search.min_score)
    #[arg(long)]
    min_score: Option<f32>,

    /// Print the full response as JSON instead of the context text
    #[arg(long)]
    json: bool,

    /// Query text
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

#[derive(Serialize)]
struct Output<'a> {
    #[serde(flatten)]
    response: &'a SearchResponse,
    context: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    // Initialize tracing
    telemetry::init_tracing(&config.observability);
    telemetry::install_metrics_exporter(&config.observability)?;

    info!("Starting iPDF Search v{}", VERSION);

    let ctx = Arc::new(PipelineContext::from_config(&config)?);
    let engine = QueryEngine::new(ctx, config.search.clone());
    let assembler = ContextAssembler::new(config.context.clone().into());

    let request = SearchRequest {
        query: cli.query.join(" "),
        limit: cli.limit,
        source_document: cli.document,
        min_score: cli.min_score,
    };
    let response = engine.search(&request).await?;
    let context = assembler.build_context(&response.results);

    if cli.json {
        let output = Output {
            response: &response,
            context,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", context);
    }
    Ok(())
}
