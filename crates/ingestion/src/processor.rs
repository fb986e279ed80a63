//! Ingestion processor
//!
//! Core logic for indexing documents: chunking, batched embedding and
//! point writes, run over a bounded pool of concurrent documents.

use crate::chunker::Chunker;
use crate::loader::{fallback_name, load_document};
use futures::stream::{self, StreamExt};
use ipdf_common::errors::{AppError, ErrorCode, Result};
use ipdf_common::metrics;
use ipdf_common::models::{Chunk, ContentElement, PointPayload};
use ipdf_common::PipelineContext;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source_document: String,
    /// Chunks produced by the chunker
    pub chunk_count: usize,
    /// Points durably written (may be partial when `error` is set)
    pub indexed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    fn failed(source_document: String, chunk_count: usize, indexed_count: usize, err: &AppError) -> Self {
        Self {
            source_document,
            chunk_count,
            indexed_count,
            error_code: Some(err.code()),
            error: Some(err.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of a batch ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    /// One entry per input, in input order
    pub documents: Vec<DocumentReport>,
    /// Documents that produced no chunks (not an error)
    pub zero_chunk_documents: Vec<String>,
    pub failed_documents: Vec<String>,
    pub total_chunks: usize,
    pub total_indexed: usize,
    pub elapsed_ms: u64,
}

impl IngestionReport {
    fn from_documents(documents: Vec<DocumentReport>, started: Instant) -> Self {
        let zero_chunk_documents = documents
            .iter()
            .filter(|d| !d.is_failed() && d.chunk_count == 0)
            .map(|d| d.source_document.clone())
            .collect();
        let failed_documents = documents
            .iter()
            .filter(|d| d.is_failed())
            .map(|d| d.source_document.clone())
            .collect();

        Self {
            total_chunks: documents.iter().map(|d| d.chunk_count).sum(),
            total_indexed: documents.iter().map(|d| d.indexed_count).sum(),
            zero_chunk_documents,
            failed_documents,
            documents,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_documents.is_empty()
    }
}

/// Ingestion processor
pub struct IngestionProcessor {
    ctx: Arc<PipelineContext>,
    chunker: Chunker,
    concurrency: usize,
    replace: bool,
}

impl IngestionProcessor {
    pub fn new(ctx: Arc<PipelineContext>, chunker: Chunker, concurrency: usize) -> Self {
        Self {
            ctx,
            chunker,
            concurrency: concurrency.max(1),
            replace: false,
        }
    }

    /// Delete a document's existing points before indexing it again
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Chunk, embed and index one document.
    ///
    /// Never returns an error: failures are recorded in the report, and points
    /// written before the failure stay in the collection.
    #[instrument(skip(self, elements), fields(document = %source_document, elements = elements.len()))]
    pub async fn process_document(
        &self,
        source_document: &str,
        elements: &[ContentElement],
    ) -> DocumentReport {
        let started = Instant::now();
        let chunks = self.chunker.chunk(elements);
        let chunk_count = chunks.len();

        if chunks.is_empty() {
            info!("Document produced no chunks");
            metrics::record_ingestion(started.elapsed().as_secs_f64(), true);
            return DocumentReport {
                source_document: source_document.to_string(),
                chunk_count: 0,
                indexed_count: 0,
                error_code: None,
                error: None,
            };
        }

        let mut indexed_count = 0;
        let result = self
            .index_chunks(source_document, &chunks, &mut indexed_count)
            .await;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_ingestion(elapsed, result.is_ok());

        match result {
            Ok(()) => {
                info!(chunk_count, indexed_count, elapsed_ms = elapsed * 1000.0, "Document indexed");
                DocumentReport {
                    source_document: source_document.to_string(),
                    chunk_count,
                    indexed_count,
                    error_code: None,
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, chunk_count, indexed_count, "Document ingestion failed");
                DocumentReport::failed(source_document.to_string(), chunk_count, indexed_count, &e)
            }
        }
    }

    /// Embed and write batches in chunking order; batch k is written before k+1 is embedded
    async fn index_chunks(
        &self,
        source_document: &str,
        chunks: &[Chunk],
        indexed_count: &mut usize,
    ) -> Result<()> {
        self.ctx.ensure_ready().await?;

        if self.replace {
            self.ctx.writer().delete_document(source_document).await?;
            debug!("Existing points removed");
        }

        for batch in chunks.chunks(self.ctx.embeddings().batch_size()) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.ctx.embeddings().embed(&texts).await?;
            let payloads = batch.iter().map(PointPayload::from_chunk).collect();
            *indexed_count += self.ctx.writer().add_points(vectors, payloads).await?;
        }
        Ok(())
    }

    /// Ingest in-memory documents, `(source_document, elements)` pairs
    pub async fn ingest_elements(&self, documents: Vec<(String, Vec<ContentElement>)>) -> IngestionReport {
        self.run_pool(documents, |(source, elements)| async move {
            self.process_document(&source, &elements).await
        })
        .await
    }

    /// Load extractor output files and ingest them
    pub async fn ingest_files(&self, paths: Vec<PathBuf>) -> IngestionReport {
        self.run_pool(paths, |path| async move {
            match load_document(&path) {
                Ok(doc) => self.process_document(&doc.source_document, &doc.elements).await,
                Err(e) => {
                    let document = match &e {
                        AppError::ExtractionUpstream { document, .. } => document.clone(),
                        _ => fallback_name(&path),
                    };
                    warn!(path = %path.display(), error = %e, "Skipping document");
                    metrics::record_ingestion(0.0, false);
                    DocumentReport::failed(document, 0, 0, &e)
                }
            }
        })
        .await
    }

    /// Run `work` over `inputs` with at most `concurrency` documents in flight
    async fn run_pool<T, F, Fut>(&self, inputs: Vec<T>, work: F) -> IngestionReport
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = DocumentReport>,
    {
        let started = Instant::now();
        let total = inputs.len();
        info!(documents = total, concurrency = self.concurrency, "Starting ingestion");

        let mut reports: Vec<(usize, DocumentReport)> = stream::iter(inputs.into_iter().enumerate())
            .map(|(i, input)| {
                let fut = work(input);
                async move { (i, fut.await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        reports.sort_by_key(|(i, _)| *i);

        let report = IngestionReport::from_documents(
            reports.into_iter().map(|(_, r)| r).collect(),
            started,
        );
        info!(
            documents = total,
            failed = report.failed_documents.len(),
            zero_chunk = report.zero_chunk_documents.len(),
            indexed = report.total_indexed,
            elapsed_ms = report.elapsed_ms,
            "Ingestion finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ipdf_common::config::PointIdStrategy;
    use ipdf_common::embeddings::{Embedder, HashEmbedder};
    use ipdf_common::models::{ContentType, SearchFilter};
    use ipdf_common::vectorstore::{InMemoryStore, VectorStore};
    use std::io::Write;

    const DIM: usize = 64;

    fn context(store: Arc<InMemoryStore>, embedder: Arc<dyn Embedder>) -> Arc<PipelineContext> {
        Arc::new(PipelineContext::new(
            embedder,
            store,
            "docs",
            4,
            PointIdStrategy::Random,
        ))
    }

    fn processor(store: Arc<InMemoryStore>) -> IngestionProcessor {
        let ctx = context(store, Arc::new(HashEmbedder::new(DIM)));
        IngestionProcessor::new(ctx, Chunker::new(200, 40, 20).unwrap(), 4)
    }

    fn page(doc: &str, page: u32, content: &str) -> ContentElement {
        ContentElement::new(content, ContentType::Text, page, doc)
    }

    fn long_text(topic: &str) -> String {
        format!("The {} section discusses results in detail. ", topic).repeat(20)
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::EmbeddingError {
                message: "model not loaded".into(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    #[tokio::test]
    async fn test_empty_middle_page_is_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let processor = processor(store.clone());

        let elements = vec![
            page("report.pdf", 1, &long_text("introduction")),
            page("report.pdf", 2, ""),
            page("report.pdf", 3, &long_text("conclusion")),
        ];
        let report = processor.process_document("report.pdf", &elements).await;

        assert!(report.error.is_none());
        assert!(report.chunk_count > 0);
        assert_eq!(report.indexed_count, report.chunk_count);

        let count = store
            .count("docs", &SearchFilter::by_document("report.pdf"))
            .await
            .unwrap();
        assert_eq!(count as usize, report.chunk_count);

        let query = HashEmbedder::new(DIM).embed("results").await.unwrap();
        let hits = store
            .search("docs", query, 100, &SearchFilter::default())
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.payload.page_number != 2));
        assert!(hits.iter().any(|h| h.payload.page_number == 1));
        assert!(hits.iter().any(|h| h.payload.page_number == 3));
    }

    #[tokio::test]
    async fn test_zero_chunk_document_is_not_a_failure() {
        let processor = processor(Arc::new(InMemoryStore::new()));
        let report = processor
            .ingest_elements(vec![
                ("blank.pdf".into(), vec![page("blank.pdf", 1, "  ")]),
                ("full.pdf".into(), vec![page("full.pdf", 1, &long_text("method"))]),
            ])
            .await;

        assert_eq!(report.zero_chunk_documents, vec!["blank.pdf".to_string()]);
        assert!(report.failed_documents.is_empty());
        assert_eq!(report.documents[0].source_document, "blank.pdf");
        assert!(report.total_indexed > 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported_per_document() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(store.clone(), Arc::new(FailingEmbedder));
        let processor = IngestionProcessor::new(ctx, Chunker::new(200, 40, 20).unwrap(), 2);

        let report = processor
            .process_document("a.pdf", &[page("a.pdf", 1, &long_text("data"))])
            .await;
        assert_eq!(report.error_code, Some(ErrorCode::EmbeddingError));
        assert_eq!(report.indexed_count, 0);
        assert_eq!(store.count("docs", &SearchFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_file_does_not_abort_others() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        let body = serde_json::json!({
            "source_document": "good.pdf",
            "elements": [{"content": long_text("analysis"), "content_type": "text", "page_number": 1}],
            "error": null
        });
        std::fs::File::create(&good)
            .unwrap()
            .write_all(body.to_string().as_bytes())
            .unwrap();
        std::fs::File::create(&bad)
            .unwrap()
            .write_all(br#"{"source_document": "bad.pdf", "error": "OCR failed"}"#)
            .unwrap();

        let processor = processor(Arc::new(InMemoryStore::new()));
        let report = processor.ingest_files(vec![bad, good]).await;

        assert!(report.has_failures());
        assert_eq!(report.failed_documents, vec!["bad.pdf".to_string()]);
        assert_eq!(report.documents[0].error_code, Some(ErrorCode::ExtractionUpstream));
        assert!(report.documents[1].indexed_count > 0);
    }

    #[tokio::test]
    async fn test_replace_mode_does_not_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let processor = processor(store.clone()).with_replace(true);
        let elements = vec![page("a.pdf", 1, &long_text("background"))];

        let first = processor.process_document("a.pdf", &elements).await;
        processor.process_document("a.pdf", &elements).await;

        let count = store.count("docs", &SearchFilter::default()).await.unwrap();
        assert_eq!(count as usize, first.indexed_count);
    }
}
