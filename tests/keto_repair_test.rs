// ABOUTME: A keto plan whose first LLM completion bans a grain in one meal; the orchestrator
// ABOUTME: runs its single-meal repair round and accepts the corrected plan as LlmRepaired
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod support;

use rmge::{
    CancellationToken, DietType, Embedder, LlmClient, MealType, Orchestrator, PlanSource,
    RmgeConfig, VectorIndex,
};
use serde_json::json;
use std::sync::Arc;
use support::{free_state, sample_doc, sample_profile, sample_request, FakeEmbedding, FakeIndex, InMemoryQuota, ScriptedLlm};

fn meal_json(meal_type: &str, name: &str, carbs: f64, protein: f64, fats: f64, ingredients: &[&str]) -> serde_json::Value {
    json!({
        "mealType": meal_type,
        "name": name,
        "ingredients": ingredients.iter().map(|i| json!({"item": i, "quantity": 50, "unit": "g"})).collect::<Vec<_>>(),
        "macros": {"protein": protein, "carbs": carbs, "fats": fats},
        "calories": 4.0 * protein + 4.0 * carbs + 9.0 * fats,
        "gi": "low",
        "prepTimeMinutes": 10,
        "tip": "Keep portions consistent.",
    })
}

#[tokio::test]
async fn keto_grain_violation_is_fixed_by_the_single_meal_repair_round() {
    let profile = sample_profile(DietType::Vegetarian, &[]);
    let request = sample_request(profile, true);

    let targets = rmge::derive(
        &request.profile.age_range,
        request.profile.height_cm,
        request.profile.weight_kg,
        request.profile.activity_level,
        request.profile.weight_goal,
        request.meals_per_day.as_u8(),
        true,
    )
    .meal_targets;
    let (c, p, f) = (targets.carbs.target_g, targets.protein.target_g, targets.fat.target_g);

    let clean_meal = |meal_type: &str| meal_json(meal_type, "Paneer Bowl", c, p, f, &["paneer", "spinach"]);
    let tainted_meal = meal_json("breakfast", "Rice Upma", c, p, f, &["rice", "vegetables"]);

    let day1 = json!({"dayNumber": 1, "meals": [tainted_meal, clean_meal("lunch"), clean_meal("dinner")]});
    let day2 = json!({"dayNumber": 2, "meals": [clean_meal("breakfast"), clean_meal("lunch"), clean_meal("dinner")]});
    let day3 = json!({"dayNumber": 3, "meals": [clean_meal("breakfast"), clean_meal("lunch"), clean_meal("dinner")]});
    let initial_completion = json!({"days": [day1, day2, day3]}).to_string();

    let repaired_meal = meal_json("breakfast", "Paneer Upma", c, p, f, &["paneer", "mixed vegetables"]);
    let repair_completion = repaired_meal.to_string();

    let embedder = Arc::new(Embedder::new(Arc::new(FakeEmbedding)));
    let index = Arc::new(VectorIndex::new(Arc::new(FakeIndex::new(vec![sample_doc(
        "d1",
        "Paneer Bowl",
        "Punjab",
        MealType::Breakfast,
        DietType::Vegetarian,
    )]))));
    let llm = Arc::new(LlmClient::new(Arc::new(ScriptedLlm::new(vec![
        ("OUTPUT SCHEMA", initial_completion),
        ("violates a constraint", repair_completion),
    ]))));
    let quota = Arc::new(InMemoryQuota::seeded("u1", free_state()));

    let orchestrator = Orchestrator::new(embedder, index, llm, quota, RmgeConfig::default());
    let cancel = CancellationToken::new();

    let plan = orchestrator.generate_plan(&request, "u1", &cancel).await.unwrap();

    assert_eq!(plan.metadata.source, PlanSource::LlmRepaired);
    let fixed_meal = &plan.days[0].meals[0];
    assert!(!fixed_meal.ingredients.iter().any(|i| i.normalized().contains("rice")));
}
