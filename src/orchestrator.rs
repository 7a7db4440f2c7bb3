// ABOUTME: generatePlan facade: threads one request through every pipeline stage end to end
// ABOUTME: Enforces per-stage and total timeouts, a cancellation token, and the quota increment gate
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::constants::{retrieval, timeouts};
use rmge_core::models::{MealPlan, PlanMetadata, PlanRequest, PlanSource, ScoredDoc, StageTimings};
use rmge_core::RmgeError;
use rmge_intelligence::{
    dedupe_all_states, derive, rerank, translate_preferences, weights_for_intent, FeatureInputs,
    MetricsTracker, Outcome, Stage,
};
use rmge_providers::{CancellationToken, Embedder, GenerationParams, LlmClient, VectorIndex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::config::RmgeConfig;
use crate::prompt_builder::assemble;
use crate::quota_gate::{QuotaDecision, QuotaGate, QuotaRepository};
use crate::validator::{assemble_fallback_plan, is_repairable_in_one_round, validate_structure, Validator};

/// A reasonable ceiling for prep time when a request carries no explicit
/// maximum; the rerank time feature only needs a denominator (spec.md §4.6).
const DEFAULT_MAX_TIME_MINUTES: f64 = 45.0;

fn build_base_query(request: &PlanRequest) -> String {
    let mut parts = Vec::new();
    if let Some(meal_type) = request.targeted_meal_type {
        parts.push(format!("{meal_type:?}").to_lowercase());
    }
    parts.push(format!("{:?}", request.profile.diet_type).to_lowercase());
    if request.is_keto {
        parts.push("keto".to_owned());
    }
    for state in &request.profile.cuisine_states {
        parts.push(state.to_lowercase());
    }
    for goal in &request.profile.goals {
        parts.push(goal.to_lowercase());
    }
    for symptom in &request.profile.symptoms {
        parts.push(symptom.to_lowercase());
    }
    parts.push("meal".to_owned());
    parts.join(" ")
}

async fn run_with_timeout<F, T>(label: &str, budget: Duration, fut: F) -> Result<T, RmgeError>
where
    F: std::future::Future<Output = Result<T, RmgeError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(RmgeError::cancelled(format!("{label} exceeded its time budget"))),
    }
}

/// Orchestrates one `generate_plan` request across retrieval, ranking,
/// prompting, and validation (spec.md §4.11).
pub struct Orchestrator<R: QuotaRepository> {
    embedder: Arc<Embedder>,
    vector_index: Arc<VectorIndex>,
    llm: Arc<LlmClient>,
    query_expander: rmge_intelligence::QueryExpander,
    metadata_filter: rmge_intelligence::MetadataFilter,
    quota_gate: QuotaGate<R>,
    validator: Validator,
    config: RmgeConfig,
    metrics: MetricsTracker,
}

impl<R: QuotaRepository> Orchestrator<R> {
    /// Build an orchestrator wiring the given adapters and repository under
    /// `config`.
    #[must_use]
    pub fn new(
        embedder: Arc<Embedder>,
        vector_index: Arc<VectorIndex>,
        llm: Arc<LlmClient>,
        quota_repository: Arc<R>,
        config: RmgeConfig,
    ) -> Self {
        Self {
            embedder,
            vector_index,
            query_expander: rmge_intelligence::QueryExpander::new(Some(Arc::clone(&llm))),
            metadata_filter: rmge_intelligence::MetadataFilter::new(),
            quota_gate: QuotaGate::new(quota_repository, config.quota.clone()),
            validator: Validator::new(Arc::clone(&llm)),
            llm,
            config,
            metrics: MetricsTracker::default(),
        }
    }

    /// Per-stage duration percentiles and per-outcome counters accumulated
    /// across every `generate_plan` call on this orchestrator (spec.md §9
    /// "Metrics").
    #[must_use]
    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    /// Generate a meal plan for `request` on behalf of `user_id` (spec.md
    /// §4.11, the whole 12-step pipeline).
    ///
    /// # Errors
    ///
    /// Returns [`RmgeError::QuotaExceeded`] if the user has no remaining
    /// generations, [`RmgeError::Cancelled`] if `cancel` fires or a stage
    /// exceeds its time budget, or [`RmgeError::GenerationFailed`] if even
    /// the deterministic fallback cannot be assembled.
    #[instrument(skip(self, request, cancel))]
    pub async fn generate_plan(
        &self,
        request: &PlanRequest,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<MealPlan, RmgeError> {
        let result = self.run_pipeline(request, user_id, cancel).await;
        self.metrics.record_outcome(match &result {
            Ok(plan) => outcome_for_source(plan.metadata.source),
            Err(err) => outcome_for_error(err),
        });
        result
    }

    async fn run_pipeline(
        &self,
        request: &PlanRequest,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<MealPlan, RmgeError> {
        let total_start = Instant::now();
        let now = chrono::Utc::now();

        // Step 1: quota check (spec.md §4.11 step 1).
        let (decision, quota_state) = self.quota_gate.check_state(user_id, now).await?;
        if decision == QuotaDecision::Denied {
            return Err(self.quota_gate.denial_error(&quota_state));
        }

        let mut timings = StageTimings::default();

        // Step 2: MacroPlanner.derive (spec.md §4.11 step 2).
        let targets = derive(
            &request.profile.age_range,
            request.profile.height_cm,
            request.profile.weight_kg,
            request.profile.activity_level,
            request.profile.weight_goal,
            request.meals_per_day.as_u8(),
            request.is_keto,
        );

        // Step 3-4: base query + expansion (spec.md §4.11 steps 3-4).
        let expand_start = Instant::now();
        let base_query = build_base_query(request);
        let variants = self
            .query_expander
            .expand(&base_query, retrieval::MAX_QUERY_VARIATIONS, true, cancel)
            .await;
        timings.expand_ms = elapsed_ms(expand_start);
        self.metrics.record_stage(Stage::Expand, expand_start.elapsed());

        // Step 5-6: bounded-fan-out embed + similarity search per variant
        // (spec.md §4.11 steps 5-6, §5 "MAX_CONCURRENT_EMBEDS").
        let embed_start = Instant::now();
        let retrieved = run_with_timeout(
            "embedding+retrieval",
            Duration::from_millis(timeouts::EMBEDDING_MS + timeouts::SIMILARITY_SEARCH_MS),
            self.retrieve_variants(&variants, cancel),
        )
        .await?;
        timings.embed_ms = elapsed_ms(embed_start);
        self.metrics.record_stage(Stage::Embed, embed_start.elapsed());

        let retrieved_count = retrieved.len();

        // Step 7: union + metadata filter (spec.md §4.11 step 7).
        let rank_start = Instant::now();
        let criteria = translate_preferences(
            matches!(
                request.profile.diet_type,
                rmge_core::models::DietType::Vegetarian
                    | rmge_core::models::DietType::Vegan
                    | rmge_core::models::DietType::Eggetarian
                    | rmge_core::models::DietType::Jain
            ),
            request.is_keto,
            request.profile.regions.iter().next().cloned(),
            None,
            request.targeted_meal_type,
        );
        let documents: Vec<_> = retrieved.iter().map(|(doc, _)| doc.clone()).collect();
        let filtered_docs = self.metadata_filter.apply(&documents, &criteria);

        let mut scored: Vec<ScoredDoc> = filtered_docs
            .into_iter()
            .filter_map(|doc| {
                retrieved
                    .iter()
                    .find(|(d, _)| d.id == doc.id)
                    .map(|(_, score)| ScoredDoc::from_similarity(doc, *score))
            })
            .collect();
        scored.retain(|d| d.semantic_score >= retrieval::MIN_SCORE);

        // Step 8: dedup with the All-States subordination rule (spec.md
        // §4.11 step 8).
        let deduped = dedupe_all_states(&scored).docs;
        let filtered_count = deduped.len();

        // Step 9: hybrid rerank with intent-adjusted weights (spec.md
        // §4.11 step 9).
        let weights = weights_for_intent(&base_query, request.is_keto);
        let per_meal_budget = request.budget / f64::from(request.meals_per_day.as_u8());
        let (reranked, _traces) = rerank(
            deduped,
            |doc| FeatureInputs {
                semantic: doc.semantic_score,
                protein_g: doc.document.metadata.protein,
                protein_upper_bound: targets.meal_targets.protein.target_g * 2.0,
                protein_target: targets.meal_targets.protein.target_g,
                carbs_g: doc.document.metadata.net_carbs(),
                carbs_target: targets.meal_targets.carbs.target_g,
                keto_carbs_max: rmge_core::constants::macros::KETO_DAILY_CARB_MAX_G,
                is_keto: request.is_keto,
                gi: doc.document.metadata.gi,
                budget_max: doc.document.metadata.budget_max,
                user_budget: per_meal_budget,
                prep_time_minutes: doc.document.metadata.prep_time_minutes(),
                max_time_minutes: DEFAULT_MAX_TIME_MINUTES,
            },
            &weights,
        );

        // Step 10: trim to the prompt document cap (spec.md §4.11 step 10).
        let trimmed: Vec<ScoredDoc> = reranked.into_iter().take(retrieval::MAX_PROMPT_DOCS).collect();
        timings.rank_ms = elapsed_ms(rank_start);
        self.metrics.record_stage(Stage::Rank, rank_start.elapsed());

        // Step 11: PromptBuilder.assemble + LLM generation + validation
        // (spec.md §4.11 step 11).
        let generate_start = Instant::now();
        let assembled = assemble(request, &targets.meal_targets, &trimmed, request.meals_per_day);
        let params = GenerationParams {
            temperature: self.config.llm.temperature,
            max_tokens: self.config.llm.max_tokens,
        };
        let completion = run_with_timeout(
            "llm generation",
            Duration::from_millis(timeouts::LLM_MS),
            async {
                self.llm
                    .generate(&assembled.text, &params, cancel)
                    .await
                    .map_err(RmgeError::from)
            },
        )
        .await?;
        timings.generate_ms = elapsed_ms(generate_start);
        self.metrics.record_stage(Stage::Generate, generate_start.elapsed());

        let validate_start = Instant::now();
        let plan = self
            .validate_or_fallback(
                &completion.text,
                request,
                &targets.meal_targets,
                &trimmed,
                retrieved_count,
                filtered_count,
                cancel,
            )
            .await?;
        timings.validate_ms = elapsed_ms(validate_start);
        self.metrics.record_stage(Stage::Validate, validate_start.elapsed());
        timings.total_ms = elapsed_ms(total_start);
        self.metrics.record_stage(Stage::Total, total_start.elapsed());

        let mut plan = plan;
        plan.metadata.timings = timings;
        plan.metadata.retrieved_count = retrieved_count;
        plan.metadata.filtered_count = filtered_count;

        // Step 12: quota increment, only after a fully validated or
        // fallback plan exists (spec.md §4.10, §4.11 step 12).
        self.quota_gate.increment(user_id, now).await?;

        info!(
            source = ?plan.metadata.source,
            retrieved_count,
            filtered_count,
            total_ms = plan.metadata.timings.total_ms,
            "plan generated"
        );
        Ok(plan)
    }

    async fn retrieve_variants(
        &self,
        variants: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<(rmge_core::models::Document, f32)>, RmgeError> {
        let semaphore = Arc::new(Semaphore::new(retrieval::MAX_CONCURRENT_EMBEDS));
        let mut handles = Vec::with_capacity(variants.len());

        for variant in variants {
            let embedder = Arc::clone(&self.embedder);
            let vector_index = Arc::clone(&self.vector_index);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let variant = variant.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| RmgeError::cancelled("retrieval semaphore closed"))?;
                let vector = embedder.embed_one(&variant, &cancel).await.map_err(RmgeError::from)?;
                vector_index
                    .similarity_search(&vector, retrieval::TOP_K, &cancel)
                    .await
                    .map_err(RmgeError::from)
            }))
        }

        let mut out: Vec<(rmge_core::models::Document, f32)> = Vec::new();
        for handle in handles {
            let result: Result<Vec<(rmge_core::models::Document, f32)>, RmgeError> = handle
                .await
                .map_err(|e| RmgeError::cancelled(format!("retrieval task panicked: {e}")))?;
            for (doc, score) in result? {
                if let Some(existing) = out.iter_mut().find(|(d, _)| d.id == doc.id) {
                    if score > existing.1 {
                        existing.1 = score;
                    }
                } else {
                    out.push((doc, score));
                }
            }
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    async fn validate_or_fallback(
        &self,
        raw_completion: &str,
        request: &PlanRequest,
        targets: &rmge_intelligence::MealTargets,
        docs: &[ScoredDoc],
        retrieved_count: usize,
        filtered_count: usize,
        cancel: &CancellationToken,
    ) -> Result<MealPlan, RmgeError> {
        let parsed = self.validator.parse_with_repair(raw_completion, cancel).await;

        let mut plan = match parsed {
            Ok(plan) => plan,
            Err(err) => {
                warn!(?err, "validation parse failed after repair, falling back to template");
                return Ok(assemble_fallback_plan(
                    docs,
                    request,
                    retrieved_count,
                    filtered_count,
                    StageTimings::default(),
                ));
            }
        };

        let violations = validate_structure(
            &plan,
            request,
            targets,
            self.config.macros.tolerance_pct,
            self.config.macros.daily_carb_tol_g,
            self.config.macros.daily_pf_tol_g,
        );

        if violations.is_empty() {
            plan.metadata.source = PlanSource::LlmGenerated;
            return Ok(plan);
        }

        if is_repairable_in_one_round(&violations) {
            if let Some(violation) = violations.first() {
                if let Some((day, meal_index)) = violation.meal_location() {
                    match self
                        .validator
                        .repair_meal(plan.clone(), day, meal_index, &format!("{violation:?}"), cancel)
                        .await
                    {
                        Ok(repaired) => {
                            let remaining = validate_structure(
                                &repaired,
                                request,
                                targets,
                                self.config.macros.tolerance_pct,
                                self.config.macros.daily_carb_tol_g,
                                self.config.macros.daily_pf_tol_g,
                            );
                            if remaining.is_empty() {
                                let mut repaired = repaired;
                                repaired.metadata.source = PlanSource::LlmRepaired;
                                return Ok(repaired);
                            }
                        }
                        Err(err) => warn!(?err, "single-meal repair round failed"),
                    }
                }
            }
        }

        warn!(violation_count = violations.len(), "hard validation failure, falling back to template");
        Ok(assemble_fallback_plan(docs, request, retrieved_count, filtered_count, StageTimings::default()))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

const fn outcome_for_source(source: PlanSource) -> Outcome {
    match source {
        PlanSource::LlmGenerated => Outcome::LlmGenerated,
        PlanSource::LlmRepaired => Outcome::LlmRepaired,
        PlanSource::TemplateFallback => Outcome::TemplateFallback,
    }
}

const fn outcome_for_error(err: &RmgeError) -> Outcome {
    match err {
        RmgeError::QuotaExceeded { .. } => Outcome::QuotaDenied,
        RmgeError::Cancelled { .. } => Outcome::Cancelled,
        RmgeError::Validation { .. }
        | RmgeError::Embedding { .. }
        | RmgeError::Index { .. }
        | RmgeError::Llm { .. }
        | RmgeError::Parse { .. }
        | RmgeError::GenerationFailed { .. } => Outcome::GenerationFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rmge_core::models::{
        ActivityLevel, Document, DocumentMetadata, DurationDays, MealType, MealsPerDay, Plan,
        QuotaState, SubscriptionStatus, UserProfile, WeightGoal,
    };
    use rmge_providers::{EmbeddingError, EmbeddingService, IndexError, LlmError, LlmService, Vector, VectorIndexService};
    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;

    struct FakeEmbedding;
    #[async_trait]
    impl EmbeddingService for FakeEmbedding {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.1_f32; 4]).collect())
        }
    }

    struct FakeIndex {
        docs: Vec<Document>,
    }
    #[async_trait]
    impl VectorIndexService for FakeIndex {
        async fn upsert(&self, _docs: &[(Document, Vector)]) -> Result<(), IndexError> {
            Ok(())
        }
        async fn query(&self, _query_vector: &Vector, k: usize) -> Result<Vec<(Document, f32)>, IndexError> {
            Ok(self.docs.iter().take(k).cloned().map(|d| (d, 0.8_f32)).collect())
        }
        async fn describe_stats(&self) -> Result<rmge_providers::IndexStats, IndexError> {
            Ok(rmge_providers::IndexStats::default())
        }
        async fn delete_all(&self, _namespace: &str) -> Result<(), IndexError> {
            Ok(())
        }
    }

    struct FakeLlm {
        response: String,
    }
    #[async_trait]
    impl LlmService for FakeLlm {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<rmge_providers::Completion, LlmError> {
            Ok(rmge_providers::Completion {
                text: self.response.clone(),
                usage: rmge_providers::TokenUsage::default(),
            })
        }
    }

    struct InMemoryQuota {
        states: StdMutex<std::collections::BTreeMap<String, QuotaState>>,
    }
    #[async_trait]
    impl QuotaRepository for InMemoryQuota {
        async fn get_quota_state(&self, user_id: &str) -> Result<QuotaState, RmgeError> {
            self.states
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .ok_or_else(|| RmgeError::validation("unknown user"))
        }
        async fn save_quota_state(&self, user_id: &str, state: &QuotaState) -> Result<(), RmgeError> {
            self.states.lock().unwrap().insert(user_id.to_owned(), state.clone());
            Ok(())
        }
    }

    fn sample_doc(name: &str) -> Document {
        Document {
            id: name.to_owned(),
            content: name.to_owned(),
            metadata: DocumentMetadata {
                meal_name: Some(name.to_owned()),
                state: Some("Kerala".to_owned()),
                meal_type: Some(MealType::Breakfast),
                protein: Some(15.0),
                carbs: Some(30.0),
                fats: Some(10.0),
                calories: Some(4.0 * 15.0 + 4.0 * 30.0 + 9.0 * 10.0),
                ..Default::default()
            },
        }
    }

    fn sample_request() -> PlanRequest {
        PlanRequest {
            profile: UserProfile {
                user_id: "u1".to_owned(),
                age_range: "25-29".to_owned(),
                height_cm: 165.0,
                weight_kg: 60.0,
                target_weight_kg: None,
                activity_level: ActivityLevel::Moderate,
                weight_goal: WeightGoal::Maintain,
                diet_type: rmge_core::models::DietType::Vegetarian,
                regions: BTreeSet::new(),
                cuisine_states: BTreeSet::new(),
                allergies: BTreeSet::new(),
                symptoms: BTreeSet::new(),
                goals: BTreeSet::new(),
            },
            meals_per_day: MealsPerDay::Three,
            duration: DurationDays::Three,
            budget: 200.0,
            is_keto: false,
            restrictions: BTreeSet::new(),
            forbidden_dishes: BTreeSet::new(),
            lab_values: None,
            targeted_meal_type: None,
        }
    }

    fn free_state() -> QuotaState {
        QuotaState {
            plan: Plan::Free,
            status: SubscriptionStatus::Active,
            total_count: 0,
            weekly_count: 0,
            last_reset_date: chrono::Utc::now(),
            subscription_end_date: None,
        }
    }

    #[tokio::test]
    async fn malformed_llm_output_falls_back_and_still_increments_quota() {
        let embedder = Arc::new(Embedder::new(Arc::new(FakeEmbedding)));
        let index = Arc::new(VectorIndex::new(Arc::new(FakeIndex {
            docs: vec![sample_doc("Masala Oats"), sample_doc("Upma")],
        })));
        let llm = Arc::new(LlmClient::new(Arc::new(FakeLlm {
            response: "not json at all, sorry".to_owned(),
        })));
        let mut states = std::collections::BTreeMap::new();
        states.insert("u1".to_owned(), free_state());
        let quota = Arc::new(InMemoryQuota { states: StdMutex::new(states) });

        let orchestrator = Orchestrator::new(embedder, index, llm, quota.clone(), RmgeConfig::default());
        let cancel = CancellationToken::new();
        let request = sample_request();

        let plan = orchestrator.generate_plan(&request, "u1", &cancel).await.unwrap();
        assert_eq!(plan.metadata.source, PlanSource::TemplateFallback);
        assert_eq!(plan.days.len(), 3);

        let saved = quota.get_quota_state("u1").await.unwrap();
        assert_eq!(saved.total_count, 1);
    }

    #[tokio::test]
    async fn exhausted_quota_is_denied_before_any_retrieval() {
        let embedder = Arc::new(Embedder::new(Arc::new(FakeEmbedding)));
        let index = Arc::new(VectorIndex::new(Arc::new(FakeIndex { docs: vec![sample_doc("Dal")] })));
        let llm = Arc::new(LlmClient::new(Arc::new(FakeLlm { response: "{}".to_owned() })));
        let mut state = free_state();
        state.total_count = 1;
        let mut states = std::collections::BTreeMap::new();
        states.insert("u1".to_owned(), state);
        let quota = Arc::new(InMemoryQuota { states: StdMutex::new(states) });

        let orchestrator = Orchestrator::new(embedder, index, llm, quota, RmgeConfig::default());
        let cancel = CancellationToken::new();
        let request = sample_request();

        let err = orchestrator.generate_plan(&request, "u1", &cancel).await.unwrap_err();
        assert!(matches!(err, RmgeError::Validation { .. } | RmgeError::QuotaExceeded { .. }));
    }
}
