//! iPDF Common Library
//!
//! Shared code for the indexing and retrieval pipeline:
//! - Content and payload models
//! - Embedding generator and provider abstraction
//! - Vector store backends, collection lifecycle and index writer
//! - Context assembly for the generation step
//! - Error types, configuration, metrics and telemetry

pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod telemetry;
pub mod vectorstore;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use context::ContextAssembler;
pub use embeddings::{Embedder, EmbeddingGenerator};
pub use errors::{AppError, ErrorCode, Result};
pub use models::{Chunk, ContentElement, ContentType, PointPayload, SearchFilter, SearchResult};
pub use pipeline::PipelineContext;
pub use vectorstore::{CollectionManager, CollectionState, IndexWriter, VectorStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
