//! Batched point writes

use super::{StoreError, VectorStore};
use crate::config::PointIdStrategy;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{IndexedPoint, PointPayload, SearchFilter};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Writes (vector, payload) pairs to one collection
#[derive(Clone)]
pub struct IndexWriter {
    store: Arc<dyn VectorStore>,
    collection: String,
    dimension: u64,
    ids: PointIdStrategy,
}

impl IndexWriter {
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        dimension: u64,
        ids: PointIdStrategy,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            dimension,
            ids,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Upsert one batch and wait for it to be applied. Returns the number of points written.
    #[instrument(skip(self, vectors, payloads), fields(collection = %self.collection, count = vectors.len()))]
    pub async fn add_points(
        &self,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<PointPayload>,
    ) -> Result<usize> {
        if vectors.is_empty() || payloads.is_empty() {
            return Err(AppError::validation("vectors", "no points to write"));
        }
        if vectors.len() != payloads.len() {
            return Err(AppError::validation(
                "payloads",
                format!(
                    "{} vectors but {} payloads",
                    vectors.len(),
                    payloads.len()
                ),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() as u64 != self.dimension) {
            return Err(AppError::CollectionMismatch {
                collection: self.collection.clone(),
                expected: self.dimension,
                actual: bad.len() as u64,
            });
        }

        let points: Vec<IndexedPoint> = vectors
            .into_iter()
            .zip(payloads)
            .map(|(vector, payload)| IndexedPoint {
                id: self.point_id(&payload),
                vector,
                payload,
            })
            .collect();
        let count = points.len();

        match self.store.upsert(&self.collection, points).await {
            Ok(()) => {}
            Err(StoreError::DimensionMismatch(message)) => {
                return Err(self.stored_dimension_mismatch(message).await);
            }
            Err(e) => {
                return Err(AppError::IndexWrite {
                    collection: self.collection.clone(),
                    message: e.to_string(),
                });
            }
        }

        metrics::record_points_indexed(count);
        debug!(count, "Points written");
        Ok(count)
    }

    /// Remove every point of one document
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn delete_document(&self, source_document: &str) -> Result<()> {
        match self
            .store
            .delete_points(&self.collection, &SearchFilter::by_document(source_document))
            .await
        {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Exact number of stored points, optionally filtered
    pub async fn count_points(&self, filter: &SearchFilter) -> Result<u64> {
        match self.store.count(&self.collection, filter).await {
            Ok(n) => Ok(n),
            Err(StoreError::NotFound(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// The collection was created for another embedding model
    async fn stored_dimension_mismatch(&self, message: String) -> AppError {
        match self.store.collection_dimension(&self.collection).await {
            Ok(Some(actual)) => AppError::CollectionMismatch {
                collection: self.collection.clone(),
                expected: self.dimension,
                actual,
            },
            _ => AppError::IndexWrite {
                collection: self.collection.clone(),
                message,
            },
        }
    }

    fn point_id(&self, payload: &PointPayload) -> Uuid {
        match self.ids {
            PointIdStrategy::Random => Uuid::new_v4(),
            PointIdStrategy::Deterministic => deterministic_id(payload),
        }
    }
}

/// Stable id for (document, page, chunk index)
pub(crate) fn deterministic_id(payload: &PointPayload) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(payload.source_document.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.page_number.to_le_bytes());
    hasher.update((payload.chunk_index as u64).to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
