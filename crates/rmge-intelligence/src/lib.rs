// ABOUTME: Pure retrieval and nutrition algorithms: expansion, filtering, dedup, rerank, macros, metrics
// ABOUTME: No network calls except the optional LLM-assisted query expansion, which degrades to rules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![warn(missing_docs)]

//! Retrieval and macro-planning algorithms for the meal plan engine.

/// Collapses retrieved documents by normalized meal name.
pub mod deduplicator;
/// Pure arithmetic for BMR/TDEE/macro targets.
pub mod macro_planner;
/// Predicate composition over document metadata.
pub mod metadata_filter;
/// In-process percentile tracker for stage durations.
pub mod metrics;
/// Query variant generation.
pub mod query_expander;
/// Hybrid re-ranking with intent-adjusted weights.
pub mod reranker;

pub use deduplicator::{dedupe_all_states, dedupe_first_occurrence, DedupResult, GroupDecision};
pub use macro_planner::{derive, DailyGrams, DerivedTargets, MacroSplit, MealTarget, MealTargets};
pub use metadata_filter::{translate_preferences, FieldFilter, FilterCriteria, MetadataFilter};
pub use metrics::{MetricsTracker, Outcome, Stage, StagePercentiles};
pub use query_expander::QueryExpander;
pub use reranker::{rerank, score_features, weights_for_intent, FeatureInputs, FeatureScores, Weights};
