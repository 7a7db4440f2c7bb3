// ABOUTME: Collapses documents by normalized mealName, subordinating "All States" to state-specific variants
// ABOUTME: Also offers a simple (mealName, state) first-occurrence mode without the All-States rule
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::models::ScoredDoc;
use std::collections::BTreeMap;

/// Per-group outcome recorded for observability (spec.md §4.5 "Statistics
/// report duplication rate and per-group decisions").
#[derive(Debug, Clone)]
pub struct GroupDecision {
    /// Normalized meal name for this group.
    pub meal_name: String,
    /// Number of documents that entered this group.
    pub input_count: usize,
    /// Number of documents kept after collapsing.
    pub kept_count: usize,
    /// Whether any "All States" variant was dropped in favor of
    /// state-specific variants.
    pub dropped_all_states: bool,
}

/// Result of a dedup pass: the surviving documents plus per-group
/// observability.
#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    /// Surviving scored documents.
    pub docs: Vec<ScoredDoc>,
    /// Decisions recorded per normalized meal name.
    pub decisions: Vec<GroupDecision>,
}

impl DedupResult {
    /// Fraction of input documents removed as duplicates, in `[0, 1]`.
    #[must_use]
    pub fn duplication_rate(&self, input_count: usize) -> f64 {
        if input_count == 0 {
            return 0.0;
        }
        1.0 - (self.docs.len() as f64 / input_count as f64)
    }
}

/// Collapse `docs` by normalized `mealName` with the "All States"
/// subordination rule (spec.md §4.5, §3 invariant, §8 property 3).
#[must_use]
pub fn dedupe_all_states(docs: &[ScoredDoc]) -> DedupResult {
    let mut groups: BTreeMap<String, Vec<&ScoredDoc>> = BTreeMap::new();
    for doc in docs {
        groups
            .entry(doc.document.normalized_meal_name())
            .or_default()
            .push(doc);
    }

    let mut out = Vec::new();
    let mut decisions = Vec::new();

    for (meal_name, group) in groups {
        let input_count = group.len();
        let (all_states, state_specific): (Vec<&&ScoredDoc>, Vec<&&ScoredDoc>) =
            group.iter().partition(|d| d.document.is_all_states());

        let dropped_all_states = !state_specific.is_empty() && !all_states.is_empty();

        if state_specific.is_empty() {
            if let Some(best) = all_states
                .into_iter()
                .max_by(|a, b| a.effective_score().total_cmp(&b.effective_score()))
            {
                out.push((*best).clone());
            }
            decisions.push(GroupDecision {
                meal_name,
                input_count,
                kept_count: 1,
                dropped_all_states: false,
            });
            continue;
        }

        let mut by_state: BTreeMap<String, &ScoredDoc> = BTreeMap::new();
        for doc in state_specific {
            let state = doc
                .document
                .metadata
                .state
                .clone()
                .unwrap_or_default()
                .to_lowercase();
            by_state
                .entry(state)
                .and_modify(|existing| {
                    if doc.effective_score() > existing.effective_score() {
                        *existing = doc;
                    }
                })
                .or_insert(doc);
        }

        let kept_count = by_state.len();
        for doc in by_state.into_values() {
            out.push(doc.clone());
        }
        decisions.push(GroupDecision {
            meal_name,
            input_count,
            kept_count,
            dropped_all_states,
        });
    }

    DedupResult {
        docs: out,
        decisions,
    }
}

/// Simple first-occurrence dedup under `(mealName, state)`, without the
/// All-States subordination rule (spec.md §4.5 "Alternative simple mode").
#[must_use]
pub fn dedupe_first_occurrence(docs: &[ScoredDoc]) -> DedupResult {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for doc in docs {
        let key = (
            doc.document.normalized_meal_name(),
            doc.document
                .metadata
                .state
                .clone()
                .unwrap_or_default()
                .to_lowercase(),
        );
        if seen.insert(key) {
            out.push(doc.clone());
        }
    }
    DedupResult {
        docs: out,
        decisions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmge_core::models::{Document, DocumentMetadata};

    fn scored(meal_name: &str, state: &str, score: f32) -> ScoredDoc {
        ScoredDoc::from_similarity(
            Document {
                id: format!("{meal_name}-{state}"),
                content: meal_name.to_string(),
                metadata: DocumentMetadata {
                    meal_name: Some(meal_name.to_string()),
                    state: Some(state.to_string()),
                    ..Default::default()
                },
            },
            score,
        )
    }

    #[test]
    fn drops_all_states_when_state_specific_exists() {
        let docs = vec![
            scored("Masala Oats", "All States", 0.9),
            scored("Masala Oats", "Kerala", 0.5),
        ];
        let result = dedupe_all_states(&docs);
        assert_eq!(result.docs.len(), 1);
        assert_eq!(
            result.docs[0].document.metadata.state.as_deref(),
            Some("Kerala")
        );
    }

    #[test]
    fn keeps_highest_scored_all_states_when_no_state_specific() {
        let docs = vec![
            scored("Dal Khichdi", "All States", 0.4),
            scored("Dal Khichdi", "All States", 0.8),
        ];
        let result = dedupe_all_states(&docs);
        assert_eq!(result.docs.len(), 1);
        assert!((result.docs[0].semantic_score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn keeps_one_per_distinct_state() {
        let docs = vec![
            scored("Biryani", "Telangana", 0.6),
            scored("Biryani", "Kerala", 0.7),
        ];
        let result = dedupe_all_states(&docs);
        assert_eq!(result.docs.len(), 2);
    }

    #[test]
    fn output_never_exceeds_input_size() {
        let docs = vec![
            scored("Idli", "Kerala", 0.5),
            scored("Idli", "Kerala", 0.9),
            scored("Dosa", "All States", 0.3),
        ];
        let result = dedupe_all_states(&docs);
        assert!(result.docs.len() <= docs.len());
    }

    #[test]
    fn first_occurrence_mode_ignores_all_states_rule() {
        let docs = vec![
            scored("Dal", "All States", 0.9),
            scored("Dal", "Kerala", 0.5),
        ];
        let result = dedupe_first_occurrence(&docs);
        assert_eq!(result.docs.len(), 2);
    }
}
