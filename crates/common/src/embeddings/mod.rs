//! Embedding service abstraction
//!
//! Provides a unified interface for multiple embedding providers:
//! - Ollama (nomic-embed-text and other local models)
//! - OpenAI-compatible endpoints
//! - Hashed bag-of-words (offline, deterministic)
//!
//! [`EmbeddingGenerator`] sits on top of a provider and enforces batching,
//! vector count and dimension checks.

mod hash;
mod ollama;
mod openai;

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    /// Generate embeddings for multiple texts in one backend call
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Batching and validation layer over an [`Embedder`]
#[derive(Clone)]
pub struct EmbeddingGenerator {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl EmbeddingGenerator {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Vector dimension produced by the underlying model
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Texts per backend call
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed `texts` in sequential batches, returning one vector per text in order.
    ///
    /// Any failed batch aborts the whole call.
    #[instrument(skip(self, texts), fields(model = %self.model_name(), count = texts.len()))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let result = self.embedder.embed_batch(batch).await;
            let elapsed = start.elapsed().as_secs_f64();

            let batch_vectors = match result {
                Ok(v) => v,
                Err(e) => {
                    metrics::record_embedding(elapsed, self.model_name(), batch.len(), false);
                    warn!(error = %e, batch_size = batch.len(), "Embedding batch failed");
                    return Err(e);
                }
            };

            if let Err(e) = self.check_batch(batch.len(), &batch_vectors) {
                metrics::record_embedding(elapsed, self.model_name(), batch.len(), false);
                return Err(e);
            }

            metrics::record_embedding(elapsed, self.model_name(), batch.len(), true);
            debug!(batch_size = batch.len(), elapsed_ms = elapsed * 1000.0, "Embedded batch");
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    /// Embed a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    fn check_batch(&self, expected_count: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected_count {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "backend returned {} vectors for {} texts",
                    vectors.len(),
                    expected_count
                ),
            });
        }
        let expected = self.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(AppError::EmbeddingDimension {
                expected,
                actual: bad.len(),
            });
        }
        Ok(())
    }
}

/// Run a backend call, retrying transient failures with exponential backoff
/// until `budget` has elapsed.
pub(crate) async fn with_retry<T, F, Fut>(budget: Duration, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(budget))
        .build();

    backoff::future::retry(policy, || {
        let fut = call();
        async move {
            fut.await.map_err(|e| {
                if e.is_retryable() {
                    warn!(error = %e, "Embedding request failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}

/// Classify an unsuccessful HTTP status from an embedding backend
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> AppError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AppError::EmbeddingUnavailable {
            message: format!("API error {}: {}", status, body),
        }
    } else {
        AppError::EmbeddingError {
            message: format!("API error {}: {}", status, body),
        }
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(key, config)?))
        }
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("unknown embedding provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns vectors of a fixed length and counts backend calls
    struct FixedEmbedder {
        produce: usize,
        declared: usize,
        calls: AtomicUsize,
        drop_last: bool,
    }

    impl FixedEmbedder {
        fn new(produce: usize, declared: usize) -> Self {
            Self {
                produce,
                declared,
                calls: AtomicUsize::new(0),
                drop_last: false,
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out: Vec<Vec<f32>> = texts.iter().map(|_| vec![0.5; self.produce]).collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            self.declared
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn test_batches_are_sequential_and_complete() {
        let backend = Arc::new(FixedEmbedder::new(8, 8));
        let generator = EmbeddingGenerator::new(backend.clone(), 32);

        let vectors = generator.embed(&texts(70)).await.unwrap();
        assert_eq!(vectors.len(), 70);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let generator = EmbeddingGenerator::new(Arc::new(FixedEmbedder::new(384, 768)), 32);
        let err = generator.embed(&texts(2)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::EmbeddingDimension {
                expected: 768,
                actual: 384
            }
        ));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let mut backend = FixedEmbedder::new(4, 4);
        backend.drop_last = true;
        let generator = EmbeddingGenerator::new(Arc::new(backend), 32);
        let err = generator.embed(&texts(3)).await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingError { .. }));
    }

    #[tokio::test]
    async fn test_embed_one() {
        let generator = EmbeddingGenerator::new(Arc::new(HashEmbedder::new(64)), 32);
        let vector = generator.embed_one("hello").await.unwrap();
        assert_eq!(vector.len(), 64);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_permanent_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_retry(Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AppError::EmbeddingError {
                    message: "bad request".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::EmbeddingUnavailable {
                        message: "503".into(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_factory_requires_openai_key() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            api_key: None,
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
