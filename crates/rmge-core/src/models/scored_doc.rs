// ABOUTME: Document augmented with retrieval and re-rank scores
// ABOUTME: Threaded through similarity search -> filter -> dedup -> rerank

use super::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A [`Document`] paired with its retrieval score and, once re-ranked, its
/// combined score and per-feature breakdown (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDoc {
    /// The underlying document.
    pub document: Document,
    /// Cosine similarity score from vector search, in `[0, 1]`.
    pub semantic_score: f32,
    /// Combined hybrid score after re-ranking, when present.
    pub rerank_score: Option<f32>,
    /// Per-feature scores contributing to `rerank_score`, for debugging
    /// (spec.md §4.6: "per-item debugging output").
    pub feature_scores: BTreeMap<String, f32>,
}

impl ScoredDoc {
    /// Wrap a freshly retrieved document with its similarity score.
    #[must_use]
    pub fn from_similarity(document: Document, semantic_score: f32) -> Self {
        Self {
            document,
            semantic_score,
            rerank_score: None,
            feature_scores: BTreeMap::new(),
        }
    }

    /// The score to sort/display by: re-rank score if present, else semantic.
    #[must_use]
    pub fn effective_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.semantic_score)
    }
}
