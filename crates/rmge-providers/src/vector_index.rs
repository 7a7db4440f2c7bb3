// ABOUTME: Remote vector index adapter: batched upsert, similarity search, stats
// ABOUTME: Normalizes content and serializes sequence/object metadata at the storage boundary

use async_trait::async_trait;
use rmge_core::models::Document;
use rmge_core::RetryClass;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::embedder::Vector;
use crate::retry::{retry, CancellationToken, Retryable, RetryOutcome, RetryPolicy};

/// Upsert batch size bounds (spec.md §4.2: "batched at 100-200 per call").
pub const UPSERT_BATCH_SIZE: usize = 150;

/// Failures from the vector index adapter (spec.md §4.2).
#[derive(Debug, Error, Clone)]
pub enum IndexError {
    /// Upstream call failed.
    #[error("vector index error: {message}")]
    Upstream {
        /// Description of the failure.
        message: String,
        /// Whether this class of failure should be retried.
        retryable: bool,
    },
}

impl Retryable for IndexError {
    fn retry_class(&self) -> RetryClass {
        match self {
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

impl From<IndexError> for rmge_core::RmgeError {
    fn from(err: IndexError) -> Self {
        let retryable = err.retry_class() == RetryClass::Retryable;
        let IndexError::Upstream { message, .. } = err;
        Self::Index { message, retryable }
    }
}

/// Aggregate stats reported by [`VectorIndexService::stats`] (spec.md §4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    /// Total documents currently stored.
    pub count: u64,
}

/// The narrow contract to the remote vector index (spec.md §6): `upsert`,
/// `query`, `describeStats`, `deleteAll`. Implementations own the namespace.
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Insert or update a batch of already-normalized documents with their
    /// embedding vectors.
    async fn upsert(&self, docs: &[(Document, Vector)]) -> Result<(), IndexError>;
    /// Top-`k` documents by cosine similarity to `query_vector`, with their
    /// scores in `[0, 1]`.
    async fn query(&self, query_vector: &Vector, k: usize) -> Result<Vec<(Document, f32)>, IndexError>;
    /// Total document count.
    async fn describe_stats(&self) -> Result<IndexStats, IndexError>;
    /// Remove every document in `namespace`.
    async fn delete_all(&self, namespace: &str) -> Result<(), IndexError>;
}

/// Adapter over a [`VectorIndexService`] applying `Retry` to every call
/// (spec.md §4.2, §5: "must be safe for concurrent readers and writers").
pub struct VectorIndex {
    service: Arc<dyn VectorIndexService>,
    policy: RetryPolicy,
}

impl VectorIndex {
    /// Wrap `service` with the default retry policy.
    #[must_use]
    pub fn new(service: Arc<dyn VectorIndexService>) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
        }
    }

    /// Top-`k` similarity search.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] once retries are exhausted.
    #[instrument(skip(self, query_vector, cancel))]
    pub async fn similarity_search(
        &self,
        query_vector: &Vector,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Document, f32)>, IndexError> {
        match retry(&self.policy, cancel, || {
            let service = Arc::clone(&self.service);
            async move { service.query(query_vector, k).await }
        })
        .await
        {
            Ok(results) => Ok(results),
            Err(RetryOutcome::Failed(err)) => Err(err),
            Err(RetryOutcome::Cancelled) => Err(IndexError::Upstream {
                message: "cancelled".to_owned(),
                retryable: false,
            }),
        }
    }

    /// Upsert `docs` in batches of at most [`UPSERT_BATCH_SIZE`], each batch
    /// normalized per [`normalize_for_storage`] and issued sequentially
    /// (spec.md §4.2, §5).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] from the first batch that exhausts retries.
    pub async fn upsert(
        &self,
        docs: &[(Document, Vector)],
        cancel: &CancellationToken,
    ) -> Result<(), IndexError> {
        for chunk in docs.chunks(UPSERT_BATCH_SIZE) {
            let normalized: Vec<(Document, Vector)> = chunk
                .iter()
                .map(|(doc, vec)| (normalize_for_storage(doc), vec.clone()))
                .collect();

            match retry(&self.policy, cancel, || {
                let service = Arc::clone(&self.service);
                let normalized = normalized.clone();
                async move { service.upsert(&normalized).await }
            })
            .await
            {
                Ok(()) => {}
                Err(RetryOutcome::Failed(err)) => return Err(err),
                Err(RetryOutcome::Cancelled) => {
                    return Err(IndexError::Upstream {
                        message: "cancelled".to_owned(),
                        retryable: false,
                    })
                }
            }
        }
        Ok(())
    }

    /// Remove every document in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] once retries are exhausted.
    pub async fn delete_all(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IndexError> {
        match retry(&self.policy, cancel, || {
            let service = Arc::clone(&self.service);
            async move { service.delete_all(namespace).await }
        })
        .await
        {
            Ok(()) => Ok(()),
            Err(RetryOutcome::Failed(err)) => Err(err),
            Err(RetryOutcome::Cancelled) => Err(IndexError::Upstream {
                message: "cancelled".to_owned(),
                retryable: false,
            }),
        }
    }

    /// Current index statistics.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] once retries are exhausted.
    pub async fn stats(&self, cancel: &CancellationToken) -> Result<IndexStats, IndexError> {
        match retry(&self.policy, cancel, || {
            let service = Arc::clone(&self.service);
            async move { service.describe_stats().await }
        })
        .await
        {
            Ok(stats) => Ok(stats),
            Err(RetryOutcome::Failed(err)) => Err(err),
            Err(RetryOutcome::Cancelled) => Err(IndexError::Upstream {
                message: "cancelled".to_owned(),
                retryable: false,
            }),
        }
    }
}

/// Normalize a document's content and metadata the way an external index
/// that only stores scalar metadata expects: sequence-valued fields joined
/// with `", "`, object-valued fields serialized to a JSON string (spec.md
/// §4.2, §9 "Sequence-valued metadata must be preserved through the
/// serialization round-trip").
#[must_use]
pub fn normalize_for_storage(doc: &Document) -> Document {
    let mut metadata = doc.metadata.clone();
    metadata.ingredient_tags = metadata
        .ingredient_tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect();

    for value in metadata.extra.values_mut() {
        if let serde_json::Value::Array(items) = value {
            let joined = items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            *value = serde_json::Value::String(joined);
        } else if value.is_object() {
            *value = serde_json::Value::String(value.to_string());
        }
    }

    Document {
        id: doc.id.clone(),
        content: doc.content.trim().to_string(),
        metadata,
    }
}

/// Deserialize the scalar view a downstream consumer expects from metadata
/// that may have arrived comma-joined or as a JSON string (inverse of
/// [`normalize_for_storage`]'s list/object handling, spec.md §9).
#[must_use]
pub fn parse_sequence_field(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmge_core::models::DocumentMetadata;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            content: "  Palak Paneer with roti  ".to_string(),
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn normalize_trims_content() {
        let normalized = normalize_for_storage(&doc("1"));
        assert_eq!(normalized.content, "Palak Paneer with roti");
    }

    #[test]
    fn sequence_metadata_round_trips_through_comma_join() {
        let mut d = doc("1");
        d.metadata.extra.insert(
            "tags".to_string(),
            serde_json::json!(["spicy", "protein-rich"]),
        );
        let normalized = normalize_for_storage(&d);
        let joined = normalized.metadata.extra.get("tags").unwrap();
        assert_eq!(joined, &serde_json::json!("spicy, protein-rich"));
        assert_eq!(
            parse_sequence_field(joined.as_str().unwrap()),
            vec!["spicy".to_string(), "protein-rich".to_string()]
        );
    }
}
