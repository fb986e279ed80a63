//! Core data model shared by ingestion and retrieval
//!
//! Content elements arrive from the extractor, chunks are produced by the
//! chunker, and point payloads are what the vector store keeps next to each
//! vector.

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of extracted content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Table,
    Image,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Table => "table",
            ContentType::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted segment of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentElement {
    /// Raw extracted content
    pub content: String,

    pub content_type: ContentType,

    /// 1-based page number
    pub page_number: u32,

    /// Originating document; filled from the enclosing file when omitted
    #[serde(default)]
    pub source_document: String,

    /// Optional binary payload (rendered image bytes), base64 on the wire
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub auxiliary_payload: Option<Vec<u8>>,
}

impl ContentElement {
    pub fn new(
        content: impl Into<String>,
        content_type: ContentType,
        page_number: u32,
        source_document: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            content_type,
            page_number,
            source_document: source_document.into(),
            auxiliary_payload: None,
        }
    }

    pub fn with_auxiliary_payload(mut self, bytes: Vec<u8>) -> Self {
        self.auxiliary_payload = Some(bytes);
        self
    }

    /// Check the structural invariants the extractor promises
    pub fn validate(&self) -> Result<()> {
        if self.page_number == 0 {
            return Err(AppError::validation(
                "page_number",
                format!("page numbers start at 1 ({})", self.source_document),
            ));
        }
        if self.source_document.trim().is_empty() {
            return Err(AppError::validation(
                "source_document",
                "source document name is empty",
            ));
        }
        Ok(())
    }
}

/// Unit of text that is embedded and indexed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Text that is sent to the embedding model (never empty)
    pub text: String,
    pub page_number: u32,
    pub source_document: String,
    pub content_type: ContentType,
    /// Verbatim table/image content, never embedded
    pub raw_payload: Option<String>,
    /// Position in the document's chunking order
    pub chunk_index: usize,
}

/// Metadata stored with every vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    pub source_document: String,
    pub page_number: u32,
    pub content_type: ContentType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl PointPayload {
    /// Build the payload for a chunk, stamped with the indexing time
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            source_document: chunk.source_document.clone(),
            page_number: chunk.page_number,
            content_type: chunk.content_type,
            content: chunk.text.clone(),
            raw_payload: chunk.raw_payload.clone(),
            chunk_index: chunk.chunk_index,
            indexed_at: Some(Utc::now()),
        }
    }

    /// Text shown to the generation step
    pub fn display_content(&self) -> &str {
        match (self.content_type, self.raw_payload.as_deref()) {
            (ContentType::Table, Some(raw)) => raw,
            _ => &self.content,
        }
    }
}

/// A vector ready to be written, with its id
#[derive(Debug, Clone)]
pub struct IndexedPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// One scored hit from the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Point id as stored
    pub id: String,
    /// Cosine similarity
    pub score: f32,
    pub payload: PointPayload,
}

/// Equality filter applied to candidate retrieval and deletes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
}

impl SearchFilter {
    pub fn by_document(source_document: impl Into<String>) -> Self {
        Self {
            source_document: Some(source_document.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_document.is_none()
    }

    pub fn matches(&self, payload: &PointPayload) -> bool {
        match &self.source_document {
            Some(doc) => &payload.source_document == doc,
            None => true,
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_str(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
