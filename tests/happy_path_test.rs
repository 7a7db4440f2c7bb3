// ABOUTME: End-to-end generate_plan run where the LLM's first completion already satisfies
// ABOUTME: every structural and macro constraint, so no repair or fallback round is needed
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod support;

use rmge::{
    ActivityLevel, CancellationToken, DietType, Embedder, LlmClient, Orchestrator, PlanSource,
    QuotaRepository, RmgeConfig, VectorIndex, WeightGoal,
};
use serde_json::json;
use std::sync::Arc;
use support::{free_state, sample_doc, sample_profile, sample_request, FakeEmbedding, FakeIndex, InMemoryQuota, ScriptedLlm};

fn meal_json(meal_type: &str, name: &str, carbs: f64, protein: f64, fats: f64) -> serde_json::Value {
    json!({
        "mealType": meal_type,
        "name": name,
        "ingredients": [{"item": "oats", "quantity": 50, "unit": "g"}],
        "macros": {"protein": protein, "carbs": carbs, "fats": fats},
        "calories": 4.0 * protein + 4.0 * carbs + 9.0 * fats,
        "gi": "low",
        "prepTimeMinutes": 10,
        "tip": "Eat slowly.",
    })
}

#[tokio::test]
async fn llm_output_matching_the_schema_is_accepted_without_repair() {
    let profile = sample_profile(DietType::Vegetarian, &[]);
    let request = sample_request(profile, false);

    let targets = rmge::derive(
        &request.profile.age_range,
        request.profile.height_cm,
        request.profile.weight_kg,
        ActivityLevel::Moderate,
        WeightGoal::Maintain,
        request.meals_per_day.as_u8(),
        false,
    )
    .meal_targets;

    let meal = |meal_type: &str| {
        meal_json(
            meal_type,
            "Vegetable Khichdi",
            targets.carbs.target_g,
            targets.protein.target_g,
            targets.fat.target_g,
        )
    };
    let day = |day_number: u32| {
        json!({
            "dayNumber": day_number,
            "meals": [meal("breakfast"), meal("lunch"), meal("dinner")],
        })
    };
    let response = json!({"days": [day(1), day(2), day(3)]}).to_string();

    let embedder = Arc::new(Embedder::new(Arc::new(FakeEmbedding)));
    let index = Arc::new(VectorIndex::new(Arc::new(FakeIndex::new(vec![sample_doc(
        "d1",
        "Vegetable Khichdi",
        "Gujarat",
        rmge::MealType::Breakfast,
        DietType::Vegetarian,
    )]))));
    let llm = Arc::new(LlmClient::new(Arc::new(ScriptedLlm::new(vec![("OUTPUT SCHEMA", response)]))));
    let quota = Arc::new(InMemoryQuota::seeded("u1", free_state()));

    let orchestrator = Orchestrator::new(embedder, index, llm, quota.clone(), RmgeConfig::default());
    let cancel = CancellationToken::new();

    let plan = orchestrator.generate_plan(&request, "u1", &cancel).await.unwrap();

    assert_eq!(plan.metadata.source, PlanSource::LlmGenerated);
    assert_eq!(plan.days.len(), 3);
    for day in &plan.days {
        assert_eq!(day.meals.len(), 3);
    }

    let saved = quota.get_quota_state("u1").await.unwrap();
    assert_eq!(saved.total_count, 1);
}
