// ABOUTME: A structurally valid but non-conforming LLM completion (wrong day count) is a hard
// ABOUTME: violation; the orchestrator falls back to template assembly and still bills the request
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod support;

use rmge::{CancellationToken, DietType, Embedder, LlmClient, MealType, Orchestrator, PlanSource, QuotaRepository, RmgeConfig, VectorIndex};
use serde_json::json;
use std::sync::Arc;
use support::{free_state, sample_doc, sample_profile, sample_request, FakeEmbedding, FakeIndex, InMemoryQuota, ScriptedLlm};

#[tokio::test]
async fn wrong_day_count_is_a_hard_violation_and_falls_back() {
    let profile = sample_profile(DietType::Vegetarian, &[]);
    let request = sample_request(profile, false);

    let targets = rmge::derive(
        &request.profile.age_range,
        request.profile.height_cm,
        request.profile.weight_kg,
        request.profile.activity_level,
        request.profile.weight_goal,
        request.meals_per_day.as_u8(),
        false,
    )
    .meal_targets;

    let meal = || {
        json!({
            "mealType": "breakfast",
            "name": "Vegetable Khichdi",
            "ingredients": [{"item": "rice", "quantity": 50, "unit": "g"}],
            "macros": {
                "protein": targets.protein.target_g,
                "carbs": targets.carbs.target_g,
                "fats": targets.fat.target_g,
            },
            "calories": 0,
            "gi": "low",
            "prepTimeMinutes": 10,
            "tip": null,
        })
    };
    // The request asks for 3 days; this completion only supplies 2, which
    // `validate_structure` treats as a hard, non-repairable violation.
    let response = json!({"days": [
        {"dayNumber": 1, "meals": [meal(), meal(), meal()]},
        {"dayNumber": 2, "meals": [meal(), meal(), meal()]},
    ]})
    .to_string();

    let embedder = Arc::new(Embedder::new(Arc::new(FakeEmbedding)));
    let index = Arc::new(VectorIndex::new(Arc::new(FakeIndex::new(vec![sample_doc(
        "d1",
        "Masala Oats",
        "Kerala",
        MealType::Breakfast,
        DietType::Vegetarian,
    )]))));
    let llm = Arc::new(LlmClient::new(Arc::new(ScriptedLlm::new(vec![("OUTPUT SCHEMA", response)]))));
    let quota = Arc::new(InMemoryQuota::seeded("u1", free_state()));

    let orchestrator = Orchestrator::new(embedder, index, llm, quota.clone(), RmgeConfig::default());
    let cancel = CancellationToken::new();

    let plan = orchestrator.generate_plan(&request, "u1", &cancel).await.unwrap();

    assert_eq!(plan.metadata.source, PlanSource::TemplateFallback);
    assert_eq!(plan.days.len(), 3);

    let saved = quota.get_quota_state("u1").await.unwrap();
    assert_eq!(saved.total_count, 1);
}
