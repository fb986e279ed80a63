//! Pipeline context
//!
//! Everything ingestion and retrieval share, built once per process and
//! passed explicitly: embedding generator, vector store, collection manager
//! and index writer. Switching embedding provider means building a new
//! context.

use crate::config::{AppConfig, PointIdStrategy};
use crate::embeddings::{create_embedder, Embedder, EmbeddingGenerator};
use crate::errors::{AppError, Result};
use crate::vectorstore::{create_vector_store, CollectionManager, CollectionState, IndexWriter, VectorStore};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub struct PipelineContext {
    embeddings: EmbeddingGenerator,
    store: Arc<dyn VectorStore>,
    collections: CollectionManager,
    writer: IndexWriter,
    collection: String,
    ready: OnceCell<CollectionState>,
}

impl PipelineContext {
    /// Build providers from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let embedder = create_embedder(&config.embedding)?;
        let store = create_vector_store(&config.vector_store)?;

        info!(
            embedding_provider = %config.embedding.provider,
            model = %config.embedding.model,
            dimension = config.embedding.dimension,
            vector_store = store.backend_name(),
            collection = %config.vector_store.collection,
            "Pipeline context configured"
        );

        Ok(Self::new(
            embedder,
            store,
            config.vector_store.collection.clone(),
            config.embedding.batch_size,
            config.vector_store.point_ids,
        ))
    }

    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        batch_size: usize,
        ids: PointIdStrategy,
    ) -> Self {
        let collection = collection.into();
        let dimension = embedder.dimension() as u64;
        Self {
            embeddings: EmbeddingGenerator::new(embedder, batch_size),
            collections: CollectionManager::new(store.clone()),
            writer: IndexWriter::new(store.clone(), collection.clone(), dimension, ids),
            store,
            collection,
            ready: OnceCell::new(),
        }
    }

    /// Ensure the collection and its indexes, at most once per context.
    ///
    /// Concurrent callers wait for the same initialization; a failed attempt
    /// is retried by the next caller.
    pub async fn ensure_ready(&self) -> Result<CollectionState> {
        self.ready
            .get_or_try_init(|| async {
                let state = self
                    .collections
                    .ensure_collection(&self.collection, self.dimension())
                    .await?;
                self.collections.ensure_indexes(&self.collection).await?;
                Ok::<_, AppError>(state)
            })
            .await
            .copied()
    }

    pub fn embeddings(&self) -> &EmbeddingGenerator {
        &self.embeddings
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn writer(&self) -> &IndexWriter {
        &self.writer
    }

    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Dimension of the configured embedding model
    pub fn dimension(&self) -> u64 {
        self.embeddings.dimension() as u64
    }
}
