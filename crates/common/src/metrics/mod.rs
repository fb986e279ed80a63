//! Metrics and observability utilities
//!
//! Metric names share the `ipdf_` prefix. Recording is a no-op until a
//! recorder is installed (see [`crate::telemetry::install_metrics_exporter`]).

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all iPDF metrics
pub const METRICS_PREFIX: &str = "ipdf";

/// Buckets for embedding latency (in seconds)
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Buckets for search latency (in seconds)
pub const SEARCH_BUCKETS: &[f64] = &[
    0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding backend calls"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding batch latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed embedding batches"
    );

    describe_counter!(
        format!("{}_embedding_texts_total", METRICS_PREFIX),
        Unit::Count,
        "Total texts sent for embedding"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from the last search"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents processed"
    );

    describe_counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total points written to the vector store"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-document ingestion latency in seconds"
    );

    // Collection lifecycle
    describe_counter!(
        format!("{}_collection_recreations_total", METRICS_PREFIX),
        Unit::Count,
        "Collections dropped and recreated after a dimension mismatch"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    counter!(
        format!("{}_embedding_texts_total", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .increment(batch_size as u64);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, result_count: usize, fallback: bool) {
    let mode = if fallback { "fallback" } else { "filtered" };

    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "mode" => mode
    )
    .increment(1);

    histogram!(format!("{}_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_search_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Helper to record one processed document
pub fn record_ingestion(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_points_indexed(count: usize) {
    counter!(format!("{}_chunks_indexed_total", METRICS_PREFIX)).increment(count as u64);
}

pub fn record_collection_recreated(collection: &str) {
    counter!(
        format!("{}_collection_recreations_total", METRICS_PREFIX),
        "collection" => collection.to_string()
    )
    .increment(1);
}
