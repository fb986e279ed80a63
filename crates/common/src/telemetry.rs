//! Logging and metrics exporter setup shared by the binaries

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use crate::metrics::{register_metrics, EMBEDDING_BUCKETS, METRICS_PREFIX, SEARCH_BUCKETS};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so that
/// command output on stdout stays machine readable.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Start the Prometheus exporter when a metrics port is configured
pub fn install_metrics_exporter(config: &ObservabilityConfig) -> Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let to_config_error = |e: metrics_exporter_prometheus::BuildError| AppError::Configuration {
        message: format!("metrics exporter: {}", e),
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_embedding_duration_seconds", METRICS_PREFIX)),
            EMBEDDING_BUCKETS,
        )
        .map_err(to_config_error)?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_search_duration_seconds", METRICS_PREFIX)),
            SEARCH_BUCKETS,
        )
        .map_err(to_config_error)?
        .install()
        .map_err(to_config_error)?;

    register_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
