//! Qdrant backend (gRPC, qdrant-client builder API)

use super::{FieldKind, StoreError, StoreResult, VectorStore};
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{IndexedPoint, PointPayload, SearchFilter, SearchResult};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config::Config, Condition, CountPointsBuilder,
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance,
    FieldType, Filter, PointId, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Build a client; no request is made until first use
    pub fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("invalid Qdrant configuration: {}", e),
            })?;

        debug!(url = %config.url, "Qdrant client configured");
        Ok(Self { client })
    }
}

fn classify(err: QdrantError) -> StoreError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("already exists") {
        StoreError::AlreadyExists(message)
    } else if lowered.contains("not found") || lowered.contains("doesn't exist") {
        StoreError::NotFound(message)
    } else if lowered.contains("dimension") {
        StoreError::DimensionMismatch(message)
    } else {
        StoreError::Backend(message)
    }
}

fn to_filter(filter: &SearchFilter) -> Filter {
    match &filter.source_document {
        Some(doc) => Filter::must([Condition::matches(super::FIELD_SOURCE_DOCUMENT, doc.clone())]),
        None => Filter::default(),
    }
}

fn to_json(value: Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields.into_iter().map(|(k, v)| (k, to_json(v))).collect(),
        ),
    }
}

fn payload_from(fields: HashMap<String, Value>) -> StoreResult<PointPayload> {
    let object: serde_json::Map<String, serde_json::Value> =
        fields.into_iter().map(|(k, v)| (k, to_json(v))).collect();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| StoreError::Backend(format!("malformed point payload: {}", e)))
}

fn id_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_dimension(&self, collection: &str) -> StoreResult<Option<u64>> {
        if !self.client.collection_exists(collection).await.map_err(classify)? {
            return Ok(None);
        }

        let info = self.client.collection_info(collection).await.map_err(classify)?;
        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                Config::Params(params) => Some(params.size),
                Config::ParamsMap(_) => None,
            })
            .ok_or_else(|| {
                StoreError::Backend(format!(
                    "collection `{}` has no single unnamed vector config",
                    collection
                ))
            })?;
        Ok(Some(size))
    }

    async fn create_collection(&self, collection: &str, dimension: u64) -> StoreResult<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        self.client.delete_collection(collection).await.map_err(classify)?;
        Ok(())
    }

    async fn create_field_index(
        &self,
        collection: &str,
        field: &str,
        kind: FieldKind,
    ) -> StoreResult<()> {
        let field_type = match kind {
            FieldKind::Keyword => FieldType::Keyword,
            FieldKind::Integer => FieldType::Integer,
        };
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(collection, field, field_type).wait(true),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> StoreResult<()> {
        let mut structs = Vec::with_capacity(points.len());
        for point in points {
            let json = serde_json::to_value(&point.payload)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let payload = Payload::try_from(json).map_err(|e| StoreError::Backend(e.to_string()))?;
            structs.push(PointStruct::new(point.id.to_string(), point.vector, payload));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, structs).wait(true))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: &SearchFilter,
    ) -> StoreResult<Vec<SearchResult>> {
        let mut request =
            SearchPointsBuilder::new(collection, vector, limit as u64).with_payload(true);
        if !filter.is_empty() {
            request = request.filter(to_filter(filter));
        }

        let response = self.client.search_points(request).await.map_err(classify)?;

        response
            .result
            .into_iter()
            .map(|point| {
                Ok(SearchResult {
                    id: id_string(point.id),
                    score: point.score,
                    payload: payload_from(point.payload)?,
                })
            })
            .collect()
    }

    async fn delete_points(&self, collection: &str, filter: &SearchFilter) -> StoreResult<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(to_filter(filter))
                    .wait(true),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &SearchFilter) -> StoreResult<u64> {
        let mut request = CountPointsBuilder::new(collection).exact(true);
        if !filter.is_empty() {
            request = request.filter(to_filter(filter));
        }
        let response = self.client.count(request).await.map_err(classify)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{ListValue, Struct};

    fn string(s: &str) -> Value {
        Value {
            kind: Some(Kind::StringValue(s.to_string())),
        }
    }

    #[test]
    fn test_payload_conversion() {
        let mut fields = HashMap::new();
        fields.insert("source_document".to_string(), string("a.pdf"));
        fields.insert(
            "page_number".to_string(),
            Value {
                kind: Some(Kind::IntegerValue(4)),
            },
        );
        fields.insert("content_type".to_string(), string("table"));
        fields.insert("content".to_string(), string("Table content"));
        fields.insert("raw_payload".to_string(), string("| x |"));

        let payload = payload_from(fields).unwrap();
        assert_eq!(payload.page_number, 4);
        assert_eq!(payload.raw_payload.as_deref(), Some("| x |"));
    }

    #[test]
    fn test_nested_values_to_json() {
        let mut inner = HashMap::new();
        inner.insert("k".to_string(), Value { kind: Some(Kind::BoolValue(true)) });
        let value = Value {
            kind: Some(Kind::ListValue(ListValue {
                values: vec![Value {
                    kind: Some(Kind::StructValue(Struct { fields: inner })),
                }],
            })),
        };
        assert_eq!(to_json(value), serde_json::json!([{"k": true}]));
    }

    #[test]
    fn test_id_string() {
        let id = PointId {
            point_id_options: Some(PointIdOptions::Num(7)),
        };
        assert_eq!(id_string(Some(id)), "7");
        assert_eq!(id_string(None), "");
    }
}
