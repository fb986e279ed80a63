//! Configuration management for iPDF services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store (Qdrant) configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Text chunking configuration
    #[serde(default)]
    pub chunking: ChunkingSettings,

    /// Query engine configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Batch ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: ollama, openai, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension produced by the model
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Total time budget for retrying one batch, in seconds
    #[serde(default = "default_embedding_retry_budget")]
    pub retry_budget_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// How point ids are assigned at write time
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PointIdStrategy {
    /// Fresh v4 UUID per point (re-ingestion adds points)
    #[default]
    Random,
    /// UUID derived from (source document, page, chunk index) (re-ingestion overwrites)
    Deterministic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Vector store provider: qdrant, memory
    #[serde(default = "default_vector_store_provider")]
    pub provider: String,

    /// Qdrant gRPC URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Qdrant API key (cloud deployments)
    pub api_key: Option<String>,

    /// Collection holding all indexed points
    #[serde(default = "default_collection_name")]
    pub collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_vector_store_timeout")]
    pub timeout_secs: u64,

    /// Point id assignment
    #[serde(default)]
    pub point_ids: PointIdStrategy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingSettings {
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive windows in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Text chunks whose stripped length does not exceed this are discarded
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Results returned when the caller gives no limit
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Minimum relevance score (soft, see fallback)
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Candidates fetched per requested result
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Characters of content used as the deduplication key
    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Documents processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Separator placed between result blocks
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Returned instead of an empty context
    #[serde(default = "default_empty_message")]
    pub empty_message: String,

    /// Optional character budget for the assembled context
    pub max_chars: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name attached to logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_embedding_provider() -> String { "ollama".to_string() }
fn default_embedding_base_url() -> String { "http://localhost:11434".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retry_budget() -> u64 { 60 }
fn default_batch_size() -> usize { 32 }
fn default_vector_store_provider() -> String { "qdrant".to_string() }
fn default_qdrant_url() -> String { "http://localhost:6334".to_string() }
fn default_collection_name() -> String { "ipdf_multimodal".to_string() }
fn default_vector_store_timeout() -> u64 { 60 }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_min_chunk_chars() -> usize { 50 }
fn default_search_limit() -> usize { 5 }
fn default_min_score() -> f32 { 0.3 }
fn default_candidate_multiplier() -> usize { 3 }
fn default_dedup_prefix_chars() -> usize { 100 }
fn default_concurrency() -> usize { 4 }
fn default_delimiter() -> String { "\n---\n".to_string() }
fn default_empty_message() -> String { "No relevant context found.".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "ipdf".to_string() }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            retry_budget_secs: default_embedding_retry_budget(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_store_provider(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection_name(),
            timeout_secs: default_vector_store_timeout(),
            point_ids: PointIdStrategy::default(),
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_chars: default_min_chunk_chars(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            min_score: default_min_score(),
            candidate_multiplier: default_candidate_multiplier(),
            dedup_prefix_chars: default_dedup_prefix_chars(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            empty_message: default_empty_message(),
            max_chars: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__EMBEDDING__PROVIDER=openai
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific configuration file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(AppError::Configuration {
                message: "embedding.dimension must be positive".into(),
            });
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::Configuration {
                message: "embedding.batch_size must be positive".into(),
            });
        }
        if self.chunking.chunk_size == 0 || self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Configuration {
                message: format!(
                    "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                    self.chunking.chunk_overlap, self.chunking.chunk_size
                ),
            });
        }
        if self.search.candidate_multiplier == 0 || self.search.dedup_prefix_chars == 0 {
            return Err(AppError::Configuration {
                message: "search.candidate_multiplier and search.dedup_prefix_chars must be positive".into(),
            });
        }
        if self.ingestion.concurrency == 0 {
            return Err(AppError::Configuration {
                message: "ingestion.concurrency must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.search.candidate_multiplier, 3);
        assert_eq!(config.vector_store.point_ids, PointIdStrategy::Random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("embedding.provider", "hash")
            .unwrap()
            .set_override("vector_store.point_ids", "deterministic")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.vector_store.point_ids, PointIdStrategy::Deterministic);
        assert_eq!(config.context.empty_message, "No relevant context found.");
    }
}
