// ABOUTME: Shared in-memory fakes and builders for the orchestrator integration tests
// ABOUTME: Not a test target itself; pulled in with `mod support;` from sibling test files
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![allow(dead_code)]

use async_trait::async_trait;
use rmge::{
    ActivityLevel, Completion, DietType, Document, DocumentMetadata, DurationDays, EmbeddingError,
    EmbeddingService, GenerationParams, IndexError, IndexStats, LlmError, LlmService, MealType,
    MealsPerDay, Plan, PlanRequest, QuotaRepository, QuotaState, RmgeError, SubscriptionStatus,
    TokenUsage, UserProfile, Vector, VectorIndexService, WeightGoal,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Deterministic stand-in embedder: every text maps to the same small vector,
/// since these tests exercise the orchestrator's control flow, not semantic
/// similarity.
pub struct FakeEmbedding;

#[async_trait]
impl EmbeddingService for FakeEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![0.1_f32; 4]).collect())
    }
}

/// Vector index that ignores the query vector and returns its fixed document
/// set at a fixed similarity score.
pub struct FakeIndex {
    pub docs: Vec<Document>,
    pub score: f32,
}

impl FakeIndex {
    #[must_use]
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs, score: 0.8 }
    }
}

#[async_trait]
impl VectorIndexService for FakeIndex {
    async fn upsert(&self, _docs: &[(Document, Vector)]) -> Result<(), IndexError> {
        Ok(())
    }

    async fn query(&self, _query_vector: &Vector, k: usize) -> Result<Vec<(Document, f32)>, IndexError> {
        Ok(self.docs.iter().take(k).cloned().map(|doc| (doc, self.score)).collect())
    }

    async fn describe_stats(&self) -> Result<IndexStats, IndexError> {
        Ok(IndexStats { count: self.docs.len() as u64 })
    }

    async fn delete_all(&self, _namespace: &str) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Scripted LLM that dispatches on prompt content rather than call order,
/// since the orchestrator also calls the LLM for query expansion before its
/// own generation step. Prompts containing `match_on` get `response`;
/// anything else (query expansion, unrelated repair calls) gets an empty
/// completion, which the query expander treats as "fall back to rules".
pub struct ScriptedLlm {
    pub scripts: Vec<(&'static str, String)>,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new(scripts: Vec<(&'static str, String)>) -> Self {
        Self { scripts }
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<Completion, LlmError> {
        let text = self
            .scripts
            .iter()
            .find(|(match_on, _)| prompt.contains(match_on))
            .map(|(_, response)| response.clone())
            .unwrap_or_default();
        Ok(Completion { text, usage: TokenUsage::default() })
    }
}

/// In-memory quota repository seeded with one or more user states.
pub struct InMemoryQuota {
    pub states: Mutex<BTreeMap<String, QuotaState>>,
}

impl InMemoryQuota {
    #[must_use]
    pub fn seeded(user_id: &str, state: QuotaState) -> Self {
        let mut states = BTreeMap::new();
        states.insert(user_id.to_owned(), state);
        Self { states: Mutex::new(states) }
    }
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

/// A free-plan user with no generations used yet, reset at the start of this
/// fixed week (spec.md-grounded: mirrors the orchestrator's own `free_state`
/// test helper).
#[must_use]
pub fn free_state() -> QuotaState {
    QuotaState {
        plan: Plan::Free,
        status: SubscriptionStatus::Active,
        total_count: 0,
        weekly_count: 0,
        last_reset_date: chrono::Utc.with_ymd_and_hms(2026, 7, 20, 0, 0, 0).unwrap(),
        subscription_end_date: None,
    }
}

use chrono::TimeZone;

#[must_use]
pub fn sample_doc(id: &str, name: &str, state: &str, meal_type: MealType, diet_type: DietType) -> Document {
    Document {
        id: id.to_owned(),
        content: name.to_owned(),
        metadata: DocumentMetadata {
            meal_name: Some(name.to_owned()),
            state: Some(state.to_owned()),
            meal_type: Some(meal_type),
            diet_type: Some(diet_type),
            protein: Some(15.0),
            carbs: Some(30.0),
            fats: Some(10.0),
            calories: Some(4.0 * 15.0 + 4.0 * 30.0 + 9.0 * 10.0),
            ingredient_tags: vec!["oats".to_owned(), "milk".to_owned()],
            ..Default::default()
        },
    }
}

#[must_use]
pub fn sample_profile(diet_type: DietType, cuisine_states: &[&str]) -> UserProfile {
    UserProfile {
        user_id: "u1".to_owned(),
        age_range: "25-29".to_owned(),
        height_cm: 165.0,
        weight_kg: 60.0,
        target_weight_kg: None,
        activity_level: ActivityLevel::Moderate,
        weight_goal: WeightGoal::Maintain,
        diet_type,
        regions: BTreeSet::new(),
        cuisine_states: cuisine_states.iter().map(|s| (*s).to_owned()).collect(),
        allergies: BTreeSet::new(),
        symptoms: BTreeSet::new(),
        goals: BTreeSet::new(),
    }
}

#[must_use]
pub fn sample_request(profile: UserProfile, is_keto: bool) -> PlanRequest {
    PlanRequest {
        profile,
        meals_per_day: MealsPerDay::Three,
        duration: DurationDays::Three,
        budget: 300.0,
        is_keto,
        restrictions: BTreeSet::new(),
        forbidden_dishes: BTreeSet::new(),
        lab_values: None,
        targeted_meal_type: None,
    }
}
