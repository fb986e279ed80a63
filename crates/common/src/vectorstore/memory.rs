//! In-process vector store
//!
//! Brute-force cosine search over a `HashMap` of collections. Mirrors the
//! error behaviour of the Qdrant backend closely enough for pipeline tests.

use super::{FieldKind, StoreError, StoreResult, VectorStore};
use crate::models::{IndexedPoint, PointPayload, SearchFilter, SearchResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Collection {
    dimension: u64,
    /// Insertion order is kept so equal scores come back in a stable order
    points: Vec<(String, Vec<f32>, PointPayload)>,
    /// Point id to its slot in `points`
    positions: HashMap<String, usize>,
    indexes: HashSet<String>,
}

impl Collection {
    fn put(&mut self, id: String, vector: Vec<f32>, payload: PointPayload) {
        match self.positions.get(&id) {
            Some(&slot) => self.points[slot] = (id, vector, payload),
            None => {
                self.positions.insert(id.clone(), self.points.len());
                self.points.push((id, vector, payload));
            }
        }
    }

    fn retain(&mut self, keep: impl Fn(&PointPayload) -> bool) {
        self.points.retain(|(_, _, payload)| keep(payload));
        self.positions = self
            .points
            .iter()
            .enumerate()
            .map(|(slot, (id, _, _))| (id.clone(), slot))
            .collect();
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn collection_dimension(&self, collection: &str) -> StoreResult<Option<u64>> {
        Ok(self.collections.read().await.get(collection).map(|c| c.dimension))
    }

    async fn create_collection(&self, collection: &str, dimension: u64) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(StoreError::AlreadyExists(format!("Collection `{}`", collection)));
        }
        collections.insert(
            collection.to_string(),
            Collection {
                dimension,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn create_field_index(
        &self,
        collection: &str,
        field: &str,
        _kind: FieldKind,
    ) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let c = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound(format!("Collection `{}`", collection)))?;
        if !c.indexes.insert(field.to_string()) {
            return Err(StoreError::AlreadyExists(format!("Index on `{}`", field)));
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let c = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound(format!("Collection `{}`", collection)))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() as u64 != c.dimension) {
            return Err(StoreError::DimensionMismatch(format!(
                "expected dim: {}, got {}",
                c.dimension,
                bad.vector.len()
            )));
        }

        for point in points {
            c.put(point.id.to_string(), point.vector, point.payload);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: &SearchFilter,
    ) -> StoreResult<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let c = collections
            .get(collection)
            .ok_or_else(|| StoreError::NotFound(format!("Collection `{}`", collection)))?;

        if vector.len() as u64 != c.dimension {
            return Err(StoreError::DimensionMismatch(format!(
                "expected dim: {}, got {}",
                c.dimension,
                vector.len()
            )));
        }

        let mut hits: Vec<SearchResult> = c
            .points
            .iter()
            .filter(|(_, _, payload)| filter.matches(payload))
            .map(|(id, v, payload)| SearchResult {
                id: id.clone(),
                score: cosine(&vector, v),
                payload: payload.clone(),
            })
            .collect();

        // sort_by is stable, ties keep insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_points(&self, collection: &str, filter: &SearchFilter) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let c = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound(format!("Collection `{}`", collection)))?;
        c.retain(|payload| !filter.matches(payload));
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &SearchFilter) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let c = collections
            .get(collection)
            .ok_or_else(|| StoreError::NotFound(format!("Collection `{}`", collection)))?;
        Ok(c.points.iter().filter(|(_, _, p)| filter.matches(p)).count() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use uuid::Uuid;

    fn point(doc: &str, vector: Vec<f32>) -> IndexedPoint {
        IndexedPoint {
            id: Uuid::new_v4(),
            vector,
            payload: PointPayload {
                source_document: doc.to_string(),
                page_number: 1,
                content_type: ContentType::Text,
                content: format!("content of {}", doc),
                raw_payload: None,
                chunk_index: 0,
                indexed_at: None,
            },
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_and_filters() {
        let store = InMemoryStore::new();
        store.create_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("a.pdf", vec![1.0, 0.0]),
                    point("b.pdf", vec![0.7, 0.7]),
                    point("a.pdf", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search("c", vec![1.0, 0.0], 10, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].payload.source_document, "a.pdf");

        let filtered = store
            .search("c", vec![1.0, 0.0], 10, &SearchFilter::by_document("b.pdf"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_already_exists() {
        let store = InMemoryStore::new();
        store.create_collection("c", 4).await.unwrap();
        assert!(matches!(
            store.create_collection("c", 4).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let store = InMemoryStore::new();
        store.create_collection("c", 3).await.unwrap();
        let result = store.upsert("c", vec![point("a.pdf", vec![1.0])]).await;
        assert!(matches!(result, Err(StoreError::DimensionMismatch(_))));
        assert_eq!(store.count("c", &SearchFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_by_document() {
        let store = InMemoryStore::new();
        store.create_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![point("a.pdf", vec![1.0, 0.0]), point("b.pdf", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        store
            .delete_points("c", &SearchFilter::by_document("a.pdf"))
            .await
            .unwrap();
        assert_eq!(store.count("c", &SearchFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_in_place() {
        let store = InMemoryStore::new();
        store.create_collection("c", 2).await.unwrap();
        let first = point("a.pdf", vec![1.0, 0.0]);
        let second = point("b.pdf", vec![0.9, 0.1]);
        let mut replaced = first.clone();
        replaced.payload.content = "rewritten".into();

        store.upsert("c", vec![first.clone(), second.clone()]).await.unwrap();
        store.upsert("c", vec![replaced]).await.unwrap();
        assert_eq!(store.count("c", &SearchFilter::default()).await.unwrap(), 2);

        // Same score for both, insertion order decides
        let hits = store
            .search("c", vec![0.0, 0.0], 10, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].id, first.id.to_string());
        assert_eq!(hits[0].payload.content, "rewritten");

        store
            .delete_points("c", &SearchFilter::by_document("a.pdf"))
            .await
            .unwrap();
        store.upsert("c", vec![second.clone()]).await.unwrap();
        assert_eq!(store.count("c", &SearchFilter::default()).await.unwrap(), 1);
    }
}
