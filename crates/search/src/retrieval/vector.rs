//! Vector similarity search over the indexed collection

use super::{deduplicate, SearchRequest, SearchResponse};
use ipdf_common::config::SearchConfig;
use ipdf_common::errors::{AppError, Result};
use ipdf_common::metrics;
use ipdf_common::models::{SearchFilter, SearchResult};
use ipdf_common::PipelineContext;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Query engine over a pipeline context
pub struct QueryEngine {
    ctx: Arc<PipelineContext>,
    config: SearchConfig,
}

impl QueryEngine {
    pub fn new(ctx: Arc<PipelineContext>, config: SearchConfig) -> Self {
        Self { ctx, config }
    }

    /// Run a search.
    ///
    /// A missing collection or an empty candidate set gives an empty response.
    /// Embedding and store failures surface as [`AppError::Query`].
    #[instrument(skip(self, request), fields(collection = %self.ctx.collection_name(), document = ?request.source_document))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let limit = request.limit.unwrap_or(self.config.default_limit);
        let min_score = request.min_score.unwrap_or(self.config.min_score);
        validate(&request.query, limit, min_score)?;

        let collection = self.ctx.collection_name();
        let stored = self
            .ctx
            .store()
            .collection_dimension(collection)
            .await
            .map_err(|e| AppError::query(e.into()))?;
        match stored {
            None => {
                info!("Collection does not exist, nothing to search");
                return Ok(SearchResponse::empty(elapsed_ms(started)));
            }
            Some(dimension) if dimension != self.ctx.dimension() => {
                return Err(AppError::CollectionMismatch {
                    collection: collection.to_string(),
                    expected: self.ctx.dimension(),
                    actual: dimension,
                });
            }
            Some(_) => {}
        }

        let vector = self
            .ctx
            .embeddings()
            .embed_one(&request.query)
            .await
            .map_err(AppError::query)?;

        let filter = SearchFilter {
            source_document: request.source_document.clone(),
        };
        let candidates = self
            .ctx
            .store()
            .search(
                collection,
                vector,
                limit.saturating_mul(self.config.candidate_multiplier),
                &filter,
            )
            .await
            .map_err(|e| AppError::query(e.into()))?;

        let candidate_count = candidates.len();
        let (results, fallback) = self.rank(candidates, limit, min_score);

        let query_time_ms = elapsed_ms(started);
        metrics::record_search(started.elapsed().as_secs_f64(), results.len(), fallback);
        debug!(candidate_count, returned = results.len(), fallback, query_time_ms, "Search complete");

        Ok(SearchResponse {
            results,
            candidate_count,
            fallback,
            query_time_ms,
        })
    }

    /// Score filter, dedup and truncate; fall back to the raw top candidates
    /// when nothing passes the threshold
    fn rank(&self, candidates: Vec<SearchResult>, limit: usize, min_score: f32) -> (Vec<SearchResult>, bool) {
        let prefix = self.config.dedup_prefix_chars;

        let passing: Vec<SearchResult> = candidates
            .iter()
            .filter(|r| r.score >= min_score)
            .cloned()
            .collect();

        if passing.is_empty() && !candidates.is_empty() {
            let mut results = deduplicate(candidates, prefix);
            results.truncate(limit);
            return (results, true);
        }

        let mut results = deduplicate(passing, prefix);
        results.truncate(limit);
        (results, false)
    }
}

fn validate(query: &str, limit: usize, min_score: f32) -> Result<()> {
    if query.trim().is_empty() {
        return Err(AppError::validation("query", "query text is empty"));
    }
    if limit == 0 {
        return Err(AppError::validation("limit", "limit must be positive"));
    }
    if !min_score.is_finite() {
        return Err(AppError::validation("min_score", "min_score must be a finite number"));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::dedup_key;
    use async_trait::async_trait;
    use ipdf_common::config::PointIdStrategy;
    use ipdf_common::embeddings::{Embedder, HashEmbedder};
    use ipdf_common::models::{ContentType, PointPayload};
    use ipdf_common::vectorstore::{InMemoryStore, VectorStore};
    use ipdf_common::ErrorCode;
    use tokio_test::assert_ok;

    const DIM: usize = 64;

    fn payload(doc: &str, content: &str) -> PointPayload {
        PointPayload {
            source_document: doc.into(),
            page_number: 1,
            content_type: ContentType::Text,
            content: content.into(),
            raw_payload: None,
            chunk_index: 0,
            indexed_at: None,
        }
    }

    async fn engine_with(docs: &[(&str, &str)], dim: usize) -> (Arc<InMemoryStore>, QueryEngine) {
        let store = Arc::new(InMemoryStore::new());
        let ctx = Arc::new(PipelineContext::new(
            Arc::new(HashEmbedder::new(dim)),
            store.clone(),
            "docs",
            8,
            PointIdStrategy::Random,
        ));
        if !docs.is_empty() {
            ctx.ensure_ready().await.unwrap();
            let texts: Vec<String> = docs.iter().map(|(_, c)| c.to_string()).collect();
            let vectors = ctx.embeddings().embed(&texts).await.unwrap();
            let payloads = docs.iter().map(|(d, c)| payload(d, c)).collect();
            ctx.writer().add_points(vectors, payloads).await.unwrap();
        }
        (store, QueryEngine::new(ctx, SearchConfig::default()))
    }

    #[tokio::test]
    async fn test_missing_collection_returns_empty() {
        let (_, engine) = engine_with(&[], DIM).await;
        let response = assert_ok!(engine.search(&SearchRequest::new("anything")).await);
        assert!(response.results.is_empty());
        assert_eq!(response.candidate_count, 0);
        assert!(!response.fallback);
    }

    #[tokio::test]
    async fn test_empty_collection_returns_empty() {
        let (_, engine) = engine_with(&[], DIM).await;
        engine.ctx.ensure_ready().await.unwrap();
        let response = engine.search(&SearchRequest::new("anything")).await.unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_results_respect_threshold_and_limit() {
        let (_, engine) = engine_with(
            &[
                ("a.pdf", "quarterly revenue growth was strong"),
                ("a.pdf", "revenue growth slowed in the north region"),
                ("b.pdf", "photosynthesis converts light into energy"),
                ("b.pdf", "revenue growth targets for next year"),
            ],
            DIM,
        )
        .await;

        let request = SearchRequest::new("revenue growth").with_limit(2).with_min_score(0.2);
        let response = engine.search(&request).await.unwrap();

        assert!(!response.fallback);
        assert!(response.results.len() <= 2);
        assert!(!response.results.is_empty());
        assert!(response.results.iter().all(|r| r.score >= 0.2));
        assert!(response.results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(response.candidate_count, 4);
    }

    #[tokio::test]
    async fn test_overlapping_chunks_keep_the_best_scoring_one() {
        let shared = "Revenue grew twelve percent driven by services and subscriptions in every region this year and across all markets ";
        let weaker = format!("{}with unrelated closing remarks about weather", shared);
        let stronger = format!("{}revenue services revenue services", shared);
        assert_eq!(dedup_key(&weaker, 100), dedup_key(&stronger, 100));

        let (store, engine) = engine_with(
            &[("a.pdf", weaker.as_str()), ("a.pdf", stronger.as_str())],
            DIM,
        )
        .await;
        let response = engine
            .search(&SearchRequest::new("revenue services").with_min_score(0.0))
            .await
            .unwrap();

        assert_eq!(response.candidate_count, 2);
        assert_eq!(response.results.len(), 1);

        let query = engine.ctx.embeddings().embed_one("revenue services").await.unwrap();
        let candidates = store
            .search("docs", query, 10, &SearchFilter::default())
            .await
            .unwrap();
        assert!(candidates[0].score > candidates[1].score);
        assert_eq!(response.results[0].score, candidates[0].score);
        assert_eq!(response.results[0].payload.content, stronger);
    }

    #[tokio::test]
    async fn test_same_page_tables_are_both_returned() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = Arc::new(PipelineContext::new(
            Arc::new(HashEmbedder::new(DIM)),
            store,
            "docs",
            8,
            PointIdStrategy::Random,
        ));
        ctx.ensure_ready().await.unwrap();

        let tables = [
            ("Table 1 content from report.pdf, page 3", "| revenue | 10 |"),
            ("Table 2 content from report.pdf, page 3", "| headcount | 42 |"),
        ];
        let texts: Vec<String> = tables.iter().map(|(d, _)| d.to_string()).collect();
        let vectors = ctx.embeddings().embed(&texts).await.unwrap();
        let payloads = tables
            .iter()
            .enumerate()
            .map(|(i, (description, raw))| PointPayload {
                source_document: "report.pdf".into(),
                page_number: 3,
                content_type: ContentType::Table,
                content: description.to_string(),
                raw_payload: Some(raw.to_string()),
                chunk_index: i,
                indexed_at: None,
            })
            .collect();
        ctx.writer().add_points(vectors, payloads).await.unwrap();

        let engine = QueryEngine::new(ctx, SearchConfig::default());
        let response = engine
            .search(&SearchRequest::new("table").with_min_score(0.0))
            .await
            .unwrap();

        assert_eq!(response.candidate_count, 2);
        let mut raw: Vec<&str> = response
            .results
            .iter()
            .filter_map(|r| r.payload.raw_payload.as_deref())
            .collect();
        raw.sort();
        assert_eq!(raw, vec!["| headcount | 42 |", "| revenue | 10 |"]);
    }

    #[tokio::test]
    async fn test_huge_limit_does_not_overflow() {
        let (_, engine) = engine_with(&[("a.pdf", "table of figures")], DIM).await;
        let response = assert_ok!(
            engine
                .search(&SearchRequest::new("table").with_limit(usize::MAX).with_min_score(0.0))
                .await
        );
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_when_nothing_passes() {
        let (_, engine) = engine_with(&[("a.pdf", "alpha beta gamma")], DIM).await;
        let response = engine
            .search(&SearchRequest::new("delta epsilon").with_min_score(0.99))
            .await
            .unwrap();

        assert!(response.fallback);
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_document_filter() {
        let (_, engine) = engine_with(
            &[("a.pdf", "shared words here"), ("b.pdf", "shared words there")],
            DIM,
        )
        .await;
        let response = engine
            .search(&SearchRequest::new("shared words").with_document("b.pdf").with_min_score(0.0))
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].payload.source_document, "b.pdf");
    }

    #[tokio::test]
    async fn test_validation() {
        let (_, engine) = engine_with(&[], DIM).await;
        for request in [
            SearchRequest::new("   "),
            SearchRequest::new("q").with_limit(0),
            SearchRequest::new("q").with_min_score(f32::NAN),
        ] {
            let err = engine.search(&request).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValidationError);
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_after_model_swap() {
        let (store, _) = engine_with(&[("a.pdf", "indexed with small model")], 16).await;
        let ctx = Arc::new(PipelineContext::new(
            Arc::new(HashEmbedder::new(32)),
            store,
            "docs",
            8,
            PointIdStrategy::Random,
        ));
        let engine = QueryEngine::new(ctx, SearchConfig::default());

        let err = engine.search(&SearchRequest::new("query")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::CollectionMismatch {
                expected: 32,
                actual: 16,
                ..
            }
        ));
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::EmbeddingUnavailable {
                message: "connection refused".into(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_is_query_error() {
        let store = Arc::new(InMemoryStore::new());
        store.create_collection("docs", DIM as u64).await.unwrap();
        let ctx = Arc::new(PipelineContext::new(
            Arc::new(DownEmbedder),
            store,
            "docs",
            8,
            PointIdStrategy::Random,
        ));
        let engine = QueryEngine::new(ctx, SearchConfig::default());

        let err = engine.search(&SearchRequest::new("q")).await.unwrap_err();
        match err {
            AppError::Query { source } => {
                assert!(matches!(*source, AppError::EmbeddingUnavailable { .. }))
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
