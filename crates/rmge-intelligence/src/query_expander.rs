// ABOUTME: Query variant generation: one LLM call plus rule-based transformations, cached
// ABOUTME: Falls back to rules on LLM failure, and to the original query if nothing else fires
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::cache::TtlLru;
use rmge_providers::{CancellationToken, GenerationParams, LlmClient};
use std::time::Duration;
use tracing::{debug, warn};

const INDIAN_DISH_TOKENS: &[&str] = &[
    "paneer", "dal", "curry", "biryani", "dosa", "idli", "roti", "khichdi",
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("veg", "vegetarian"),
    ("gi", "glycemic index"),
    ("carbs", "carbohydrates"),
    ("mins", "minutes"),
];

const REGIONAL_SYNONYMS: &[&[&str]] = &[
    &["dal", "daal", "lentil"],
    &["roti", "chapati", "flatbread"],
    &["paneer", "cottage cheese"],
    &["biryani", "rice pilaf"],
];

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Default variant cap when the caller doesn't specify one (spec.md §4.3).
pub const DEFAULT_MAX_VARIATIONS: usize = 3;

/// Rule-based expansion alone, used both as the LLM fallback and directly
/// when `useLLM=false` (spec.md §4.3).
#[must_use]
pub fn rule_based_variants(query: &str, max_variations: usize) -> Vec<String> {
    let lower = normalize(query);
    let mut out = Vec::new();

    if INDIAN_DISH_TOKENS.iter().any(|t| lower.contains(t)) && !lower.starts_with("indian ") {
        out.push(format!("indian {lower}"));
    }

    let mut expanded = lower.clone();
    for (abbr, full) in ABBREVIATIONS {
        let pattern = format!(" {abbr} ");
        let replacement = format!(" {full} ");
        let padded = format!(" {expanded} ");
        if padded.contains(&pattern) {
            expanded = padded.replace(&pattern, &replacement).trim().to_string();
        }
    }
    if expanded != lower {
        out.push(expanded);
    }

    out.push(format!("{lower} recipe"));
    out.push(format!("{lower} dish"));

    for group in REGIONAL_SYNONYMS {
        if let Some(hit) = group.iter().find(|term| lower.contains(**term)) {
            for synonym in group.iter().filter(|term| *term != hit) {
                out.push(lower.replacen(hit, synonym, 1));
            }
        }
    }

    if lower.contains("high protein") {
        out.push(lower.replace("high protein", "high-protein"));
        out.push(format!("{lower} keto"));
    }
    if lower.contains("low carb") {
        out.push(lower.replace("low carb", "low-carb"));
        out.push(format!("{lower} keto"));
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|v| seen.insert(v.clone()));
    out.truncate(max_variations.saturating_sub(1));
    out
}

/// Generates up to `maxVariations` distinct query variants, including the
/// original, from an LLM call plus rule-based fallback (spec.md §4.3).
pub struct QueryExpander {
    llm: Option<std::sync::Arc<LlmClient>>,
    cache: TtlLru<String, Vec<String>>,
}

impl QueryExpander {
    /// Build an expander with an optional LLM client. With no client, only
    /// rule-based variants are produced.
    #[must_use]
    pub fn new(llm: Option<std::sync::Arc<LlmClient>>) -> Self {
        Self::with_cache_bounds(
            llm,
            rmge_core::constants::cache::EXPANSION_CACHE_MAX_ENTRIES,
            Duration::from_secs(rmge_core::constants::cache::EXPANSION_CACHE_TTL_SECS),
        )
    }

    /// Build an expander with explicit cache bounds (spec.md §6
    /// `retrieval` section doesn't name these, but §4.3 fixes 200 / 1h as
    /// the default).
    #[must_use]
    pub fn with_cache_bounds(
        llm: Option<std::sync::Arc<LlmClient>>,
        cache_max_entries: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            llm,
            cache: TtlLru::new(cache_max_entries, cache_ttl),
        }
    }

    /// Expand `query` into up to `max_variations` distinct strings including
    /// the original, cached by `(normalizedQuery, maxVariations, useLLM)`.
    pub async fn expand(
        &self,
        query: &str,
        max_variations: usize,
        use_llm: bool,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let normalized = normalize(query);
        let cache_key = format!("{normalized}|{max_variations}|{use_llm}");
        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!("query expansion cache hit");
            return cached;
        }

        let mut variants = vec![normalized.clone()];
        let mut produced_by_llm = Vec::new();

        if use_llm {
            if let Some(llm) = &self.llm {
                let prompt = format!(
                    "Generate up to {} alternative search phrasings of this query, one per line, no numbering:\n{}",
                    max_variations.saturating_sub(1),
                    normalized
                );
                match llm
                    .generate(&prompt, &GenerationParams::default(), cancel)
                    .await
                {
                    Ok(completion) => {
                        produced_by_llm = completion
                            .text
                            .lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string)
                            .collect();
                    }
                    Err(err) => {
                        warn!(?err, "query expansion LLM call failed, falling back to rules");
                    }
                }
            }
        }

        if produced_by_llm.is_empty() {
            produced_by_llm = rule_based_variants(&normalized, max_variations);
        }

        for candidate in produced_by_llm {
            if variants.len() >= max_variations {
                break;
            }
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }

        self.cache.put(cache_key, variants.clone()).await;
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_indian_prefix_for_indian_dish_tokens() {
        let variants = rule_based_variants("paneer curry", 5);
        assert!(variants.iter().any(|v| v == "indian paneer curry"));
    }

    #[test]
    fn expands_known_abbreviations() {
        let variants = rule_based_variants("veg mins", 5);
        assert!(variants
            .iter()
            .any(|v| v.contains("vegetarian") && v.contains("minutes")));
    }

    #[test]
    fn adds_recipe_and_dish_suffixes() {
        let variants = rule_based_variants("khichdi", 10);
        assert!(variants.contains(&"khichdi recipe".to_string()));
        assert!(variants.contains(&"khichdi dish".to_string()));
    }

    #[test]
    fn swaps_regional_synonyms() {
        let variants = rule_based_variants("roti with dal", 10);
        assert!(variants.iter().any(|v| v.contains("chapati")));
        assert!(variants.iter().any(|v| v.contains("daal") || v.contains("lentil")));
    }

    #[test]
    fn high_protein_emits_hyphenated_and_keto_forms() {
        let variants = rule_based_variants("high protein breakfast", 10);
        assert!(variants.iter().any(|v| v.contains("high-protein")));
        assert!(variants.iter().any(|v| v.ends_with("keto")));
    }

    #[test]
    fn respects_max_variations_cap() {
        let variants = rule_based_variants("paneer dal roti biryani", 2);
        assert!(variants.len() <= 1);
    }

    #[tokio::test]
    async fn expand_without_llm_includes_original_first() {
        let expander = QueryExpander::new(None);
        let cancel = CancellationToken::new();
        let variants = expander.expand("Paneer Curry", 3, false, &cancel).await;
        assert_eq!(variants[0], "paneer curry");
        assert!(variants.len() <= 3);
    }

    #[tokio::test]
    async fn expand_is_cached_on_second_call() {
        let expander = QueryExpander::new(None);
        let cancel = CancellationToken::new();
        let first = expander.expand("dal makhani", 3, false, &cancel).await;
        let second = expander.expand("dal makhani", 3, false, &cancel).await;
        assert_eq!(first, second);
    }
}
