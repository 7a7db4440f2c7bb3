// ABOUTME: Embedding adapter: query-level LRU cache, batched document embedding, retry wrapping
// ABOUTME: Narrow interface to the embedding service per spec.md §6

use async_trait::async_trait;
use rmge_core::cache::{CacheStats, TtlLru};
use rmge_core::RetryClass;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::retry::{retry, CancellationToken, Retryable, RetryOutcome, RetryPolicy};

/// A fixed-dimension embedding vector.
pub type Vector = Vec<f32>;

/// Failures from the embedding service adapter (spec.md §4.1).
#[derive(Debug, Error, Clone)]
pub enum EmbeddingError {
    /// Empty or non-text input.
    #[error("invalid embedding input: {0}")]
    Validation(String),
    /// Upstream call failed; `retryable` distinguishes 5xx/429/network from
    /// invalid-credential/other 4xx.
    #[error("embedding service error: {message}")]
    Upstream {
        /// Description of the failure.
        message: String,
        /// Whether this class of failure should be retried.
        retryable: bool,
    },
}

impl Retryable for EmbeddingError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Validation(_) => RetryClass::NonRetryable,
            Self::Upstream { retryable, .. } => {
                if *retryable {
                    RetryClass::Retryable
                } else {
                    RetryClass::NonRetryable
                }
            }
        }
    }
}

impl From<EmbeddingError> for rmge_core::RmgeError {
    fn from(err: EmbeddingError) -> Self {
        let retryable = err.retry_class() == RetryClass::Retryable;
        match err {
            EmbeddingError::Validation(message) => Self::validation(message),
            EmbeddingError::Upstream { message, .. } => Self::Embedding { message, retryable },
        }
    }
}

/// The narrow contract to the embedding service (spec.md §6): `embed(texts)
/// -> [vector]`. Implementations own authentication and the dimension is
/// fixed at service initialization.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of already-validated, non-empty texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError>;
}

/// Embedder: query-level LRU over `embed_one`, batched `embed_many` bypassing
/// the cache, both wrapped by `Retry` (spec.md §4.1).
pub struct Embedder {
    service: Arc<dyn EmbeddingService>,
    cache: TtlLru<String, Vector>,
    single_policy: RetryPolicy,
    batch_policy: RetryPolicy,
}

impl Embedder {
    /// Build a new embedder around `service`, with the default cache bounds
    /// (500 entries / 1h TTL, spec.md §4.1).
    #[must_use]
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self::with_cache_bounds(
            service,
            rmge_core::constants::cache::EMBEDDING_CACHE_MAX_ENTRIES,
            Duration::from_secs(rmge_core::constants::cache::EMBEDDING_CACHE_TTL_SECS),
        )
    }

    /// Build a new embedder with explicit cache bounds (spec.md §6
    /// `embedding.cache.size`/`.ttlSeconds`).
    #[must_use]
    pub fn with_cache_bounds(
        service: Arc<dyn EmbeddingService>,
        cache_max_entries: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            service,
            cache: TtlLru::new(cache_max_entries, cache_ttl),
            single_policy: RetryPolicy::default(),
            batch_policy: RetryPolicy::for_batches(),
        }
    }

    /// Normalize text for use as a cache key: lowercased and trimmed
    /// (spec.md §4.1).
    fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Embed a single text, served from the LRU cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Validation`] for empty input, or the
    /// upstream error once retries are exhausted.
    #[instrument(skip(self, cancel))]
    pub async fn embed_one(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::Validation(
                "embedding input must be non-empty".to_owned(),
            ));
        }

        let key = Self::normalize(text);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("embedding cache hit");
            return Ok(cached);
        }

        let owned = text.to_string();
        let result = retry(&self.single_policy, cancel, || {
            let service = Arc::clone(&self.service);
            let owned = owned.clone();
            async move {
                let mut vectors = service.embed(std::slice::from_ref(&owned)).await?;
                vectors.pop().ok_or_else(|| {
                    EmbeddingError::Upstream {
                        message: "embedding service returned no vector".to_owned(),
                        retryable: false,
                    }
                })
            }
        })
        .await;

        match result {
            Ok(vector) => {
                self.cache.put(key, vector.clone()).await;
                Ok(vector)
            }
            Err(RetryOutcome::Failed(err)) => Err(err),
            Err(RetryOutcome::Cancelled) => Err(EmbeddingError::Upstream {
                message: "cancelled".to_owned(),
                retryable: false,
            }),
        }
    }

    /// Embed many texts, bypassing the cache, partitioned into batches of at
    /// most [`rmge_core::constants::cache::EMBEDDING_BATCH_SIZE`] issued
    /// sequentially (spec.md §4.1, §5 "upsert batches are issued
    /// sequentially").
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Validation`] if `texts` is empty, or the
    /// upstream error from the first batch that exhausts its retries.
    #[instrument(skip(self, cancel))]
    pub async fn embed_many(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vector>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::Validation(
                "embed_many requires at least one text".to_owned(),
            ));
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(rmge_core::constants::cache::EMBEDDING_BATCH_SIZE) {
            let result = retry(&self.batch_policy, cancel, || {
                let service = Arc::clone(&self.service);
                let batch = batch.to_vec();
                async move { service.embed(&batch).await }
            })
            .await;

            match result {
                Ok(vectors) => out.extend(vectors),
                Err(RetryOutcome::Failed(err)) => return Err(err),
                Err(RetryOutcome::Cancelled) => {
                    return Err(EmbeddingError::Upstream {
                        message: "cancelled".to_owned(),
                        retryable: false,
                    })
                }
            }
        }
        Ok(out)
    }

    /// Current cache hit/miss/size statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyOnceService {
        calls: AtomicU32,
        fail_first: bool,
    }

    #[async_trait]
    impl EmbeddingService for FlakyOnceService {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(EmbeddingError::Upstream {
                    message: "429".to_owned(),
                    retryable: true,
                });
            }
            Ok(texts.iter().map(|_| vec![0.1_f32; 4]).collect())
        }
    }

    #[tokio::test]
    async fn empty_input_is_validation_error() {
        let embedder = Embedder::new(Arc::new(FlakyOnceService {
            calls: AtomicU32::new(0),
            fail_first: false,
        }));
        let cancel = CancellationToken::new();
        let err = embedder.embed_one("   ", &cancel).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Validation(_)));
    }

    #[tokio::test]
    async fn caches_by_normalized_text() {
        let service = Arc::new(FlakyOnceService {
            calls: AtomicU32::new(0),
            fail_first: false,
        });
        let embedder = Embedder::new(service.clone());
        let cancel = CancellationToken::new();
        embedder.embed_one("  Paneer Curry ", &cancel).await.unwrap();
        embedder.embed_one("paneer curry", &cancel).await.unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        let stats = embedder.cache_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let service = Arc::new(FlakyOnceService {
            calls: AtomicU32::new(0),
            fail_first: true,
        });
        let embedder = Embedder::with_cache_bounds(service.clone(), 10, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let result = embedder.embed_one("dal makhani", &cancel).await;
        assert!(result.is_ok());
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn embed_many_batches_sequentially() {
        let service = Arc::new(FlakyOnceService {
            calls: AtomicU32::new(0),
            fail_first: false,
        });
        let embedder = Embedder::new(service.clone());
        let cancel = CancellationToken::new();
        let texts: Vec<String> = (0..250).map(|i| format!("dish {i}")).collect();
        let vectors = embedder.embed_many(&texts, &cancel).await.unwrap();
        assert_eq!(vectors.len(), 250);
        // 250 texts at batch size 100 -> 3 calls
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }
}
