// ABOUTME: Crate root wiring config, quota gate, prompt builder, validator, and orchestrator together
// ABOUTME: Re-exports the surface a caller or the CLI binary needs without reaching into submodules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![warn(missing_docs)]

//! Retrieval-augmented meal plan generation: given a user profile and plan
//! request, derive macro targets, retrieve and rank candidate dish
//! templates from a vector index, and have a language model assemble them
//! into a validated, budget- and quota-aware meal plan.
//!
//! [`Orchestrator::generate_plan`] is the single entry point; everything
//! else in this crate supports that one pipeline.

/// Environment-variable configuration for the whole engine.
pub mod config;
/// Single LLM prompt assembly.
pub mod prompt_builder;
/// `generate_plan` facade threading every pipeline stage end to end.
pub mod orchestrator;
/// Per-user quota check/increment.
pub mod quota_gate;
/// JSON parsing, structural validation, repair, and deterministic fallback.
pub mod validator;

pub use config::{
    EmbeddingConfig, LlmConfig, MacroToleranceConfig, QuotaConfig, RetrievalConfig, RetryConfig,
    RmgeConfig,
};
pub use orchestrator::Orchestrator;
pub use prompt_builder::{assemble, estimate_tokens, AssembledPrompt};
pub use quota_gate::{QuotaDecision, QuotaGate, QuotaRepository};
pub use validator::{
    assemble_fallback_plan, is_repairable_in_one_round, validate_structure, Validator, Violation,
};

pub use rmge_core::cache::{CacheStats, TtlLru};
pub use rmge_core::models::{
    self, ActivityLevel, Day, DietType, Document, DocumentMetadata, DurationDays, GiLevel,
    Ingredient, LabValues, Macros, Meal, MealPlan, MealType, MealsPerDay, Plan, PlanMetadata,
    PlanRequest, PlanSource, QuotaState, ScoredDoc, StageTimings, SubscriptionStatus, UserProfile,
    WeightGoal,
};
pub use rmge_core::{RetryClass, RmgeError};
pub use rmge_intelligence::{
    dedupe_all_states, dedupe_first_occurrence, derive, rerank, score_features,
    translate_preferences, weights_for_intent, DailyGrams, DedupResult, DerivedTargets,
    FeatureInputs, FeatureScores, FieldFilter, FilterCriteria, MacroSplit, MealTarget,
    MealTargets, MetadataFilter, MetricsTracker, Outcome, QueryExpander, Stage, StagePercentiles,
    Weights,
};
pub use rmge_providers::{
    retry, CancellationToken, Completion, Embedder, EmbeddingError, EmbeddingService,
    GenerationParams, IndexError, IndexStats, LlmClient, LlmError, LlmService, RetryOutcome,
    RetryPolicy, Retryable, TokenUsage, Vector, VectorIndex, VectorIndexService,
};
