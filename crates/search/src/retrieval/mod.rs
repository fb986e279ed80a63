//! Relevance-filtered vector retrieval
//!
//! The query is embedded, an oversized candidate set is fetched from the
//! vector store, then filtered by score, de-duplicated and truncated.

mod dedup;
mod vector;

pub use dedup::{dedup_key, deduplicate};
pub use vector::QueryEngine;

use ipdf_common::models::SearchResult;
use serde::{Deserialize, Serialize};

/// Search request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Maximum results to return (search.default_limit when unset)
    pub limit: Option<usize>,

    /// Restrict to one source document
    pub source_document: Option<String>,

    /// Minimum score threshold (search.min_score when unset)
    pub min_score: Option<f32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_document(mut self, source_document: impl Into<String>) -> Self {
        self.source_document = Some(source_document.into());
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked results, best first
    pub results: Vec<SearchResult>,

    /// Candidates returned by the vector store before filtering
    pub candidate_count: usize,

    /// True when no candidate reached the score threshold and the raw top
    /// candidates were returned instead
    pub fallback: bool,

    /// Query processing time in milliseconds
    pub query_time_ms: u64,
}

impl SearchResponse {
    pub(crate) fn empty(query_time_ms: u64) -> Self {
        Self {
            results: Vec::new(),
            candidate_count: 0,
            fallback: false,
            query_time_ms,
        }
    }
}
