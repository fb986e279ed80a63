//! Vector store abstraction
//!
//! Backends implement [`VectorStore`]; the pipeline only talks to the
//! [`CollectionManager`] (lifecycle) and [`IndexWriter`] (writes), and the
//! query engine uses [`VectorStore::search`] directly.

mod collection;
mod memory;
mod qdrant;
mod writer;

pub use collection::{CollectionManager, CollectionState};
pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;
pub use writer::IndexWriter;

use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{IndexedPoint, SearchFilter, SearchResult};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Payload field holding the document name
pub const FIELD_SOURCE_DOCUMENT: &str = "source_document";

/// Payload field holding the page number
pub const FIELD_PAGE_NUMBER: &str = "page_number";

/// Payload index type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Keyword,
    Integer,
}

/// Failures reported by a backend, before they are mapped to [`AppError`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("vector dimension error: {0}")]
    DimensionMismatch(String),

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::VectorStore {
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations the pipeline needs from a vector database
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Vector dimension of the collection, or `None` when it does not exist
    async fn collection_dimension(&self, collection: &str) -> StoreResult<Option<u64>>;

    /// Create a cosine-distance collection
    async fn create_collection(&self, collection: &str, dimension: u64) -> StoreResult<()>;

    async fn delete_collection(&self, collection: &str) -> StoreResult<()>;

    /// Create a payload index on `field`
    async fn create_field_index(
        &self,
        collection: &str,
        field: &str,
        kind: FieldKind,
    ) -> StoreResult<()>;

    /// Insert or overwrite points, returning once they are durable
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> StoreResult<()>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: &SearchFilter,
    ) -> StoreResult<Vec<SearchResult>>;

    /// Delete every point matching `filter`
    async fn delete_points(&self, collection: &str, filter: &SearchFilter) -> StoreResult<()>;

    /// Exact number of points matching `filter`
    async fn count(&self, collection: &str, filter: &SearchFilter) -> StoreResult<u64>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Create a vector store based on configuration
pub fn create_vector_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantStore::connect(config)?)),
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        other => Err(AppError::Configuration {
            message: format!("unknown vector store provider: {}", other),
        }),
    }
}
