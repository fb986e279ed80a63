//! Collection lifecycle: create lazily, reconcile dimension, payload indexes

use super::{FieldKind, StoreError, VectorStore, FIELD_PAGE_NUMBER, FIELD_SOURCE_DOCUMENT};
use crate::errors::{AppError, Result};
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of [`CollectionManager::ensure_collection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    /// Did not exist and was created
    Created,
    /// Existed with the expected dimension
    Ready,
    /// Existed with another dimension; dropped and created again (all points lost)
    Recreated,
}

#[derive(Clone)]
pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Make sure `name` exists with `expected_dimension`.
    ///
    /// A dimension mismatch is not fatal: the collection is deleted and
    /// created again, which drops every indexed document.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn ensure_collection(
        &self,
        name: &str,
        expected_dimension: u64,
    ) -> Result<CollectionState> {
        match self.store.collection_dimension(name).await? {
            None => self.create(name, expected_dimension).await,
            Some(actual) if actual == expected_dimension => Ok(CollectionState::Ready),
            Some(actual) => self.recreate(name, expected_dimension, actual).await,
        }
    }

    /// Create the payload indexes used by filtered search and deletes
    #[instrument(skip(self))]
    pub async fn ensure_indexes(&self, name: &str) -> Result<()> {
        let fields = [
            (FIELD_SOURCE_DOCUMENT, FieldKind::Keyword),
            (FIELD_PAGE_NUMBER, FieldKind::Integer),
        ];
        for (field, kind) in fields {
            match self.store.create_field_index(name, field, kind).await {
                Ok(()) => info!(collection = name, field, "Created payload index"),
                Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn create(&self, name: &str, dimension: u64) -> Result<CollectionState> {
        match self.store.create_collection(name, dimension).await {
            Ok(()) => {
                info!(collection = name, dimension, "Created collection");
                Ok(CollectionState::Created)
            }
            Err(StoreError::AlreadyExists(_)) => {
                // Lost a creation race, check what the winner created
                match self.store.collection_dimension(name).await? {
                    Some(actual) if actual == dimension => Ok(CollectionState::Ready),
                    Some(actual) => self.recreate(name, dimension, actual).await,
                    None => Err(AppError::VectorStore {
                        message: format!("collection `{}` vanished during creation", name),
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recreate(&self, name: &str, expected: u64, actual: u64) -> Result<CollectionState> {
        let mismatch = AppError::CollectionMismatch {
            collection: name.to_string(),
            expected,
            actual,
        };
        warn!(error = %mismatch, "Recreating collection, all indexed points are dropped");
        metrics::record_collection_recreated(name);

        self.store.delete_collection(name).await?;
        match self.store.create_collection(name, expected).await {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(CollectionState::Recreated)
    }
}
