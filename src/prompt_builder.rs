// ABOUTME: Assembles the single LLM prompt: forbidden-dishes block first, then constraints and excerpts
// ABOUTME: Token budget is approximate (1 token ≈ 4 chars); overflow truncates least-ranked excerpts only
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::models::{
    DietType, LabValues, MealsPerDay, PlanRequest, ScoredDoc,
};
use rmge_intelligence::MealTargets;

const KETO_FORBIDDEN_GRAINS: [&str; 6] = ["rice", "roti", "wheat", "bread", "potato", "corn"];
const VEGAN_FORBIDDEN: [&str; 4] = ["dairy", "egg", "meat", "fish"];
const JAIN_FORBIDDEN: [&str; 3] = ["onion", "garlic", "root vegetable"];

/// Estimated characters per token (spec.md §4.8).
const CHARS_PER_TOKEN: usize = rmge_core::constants::prompt::CHARS_PER_TOKEN;
/// Soft token budget for the whole prompt.
const MAX_ESTIMATED_TOKENS: usize = rmge_core::constants::prompt::MAX_ESTIMATED_TOKENS;
/// Upper bound on template excerpts included in the prompt.
const MAX_TEMPLATE_EXCERPTS: usize = rmge_core::constants::prompt::MAX_TEMPLATE_EXCERPTS;

/// Coarse token estimate for `text` (spec.md §4.8: "1 token ≈ 4 characters").
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Build the forbidden-dishes block placed directly after the system role
/// (spec.md §4.8 item 2: "to counteract long-context recency bias").
#[must_use]
fn forbidden_dishes_block(request: &PlanRequest) -> String {
    let mut forbidden: Vec<String> = request.forbidden_dishes.iter().cloned().collect();
    forbidden.extend(request.profile.allergies.iter().cloned());

    if request.is_keto {
        forbidden.extend(KETO_FORBIDDEN_GRAINS.iter().map(|s| (*s).to_owned()));
    }
    match request.profile.diet_type {
        DietType::Vegan => forbidden.extend(VEGAN_FORBIDDEN.iter().map(|s| (*s).to_owned())),
        DietType::Jain => forbidden.extend(JAIN_FORBIDDEN.iter().map(|s| (*s).to_owned())),
        DietType::Vegetarian | DietType::NonVegetarian | DietType::Eggetarian => {}
    }

    forbidden.sort();
    forbidden.dedup();

    if forbidden.is_empty() {
        return "FORBIDDEN DISHES AND INGREDIENTS: none.".to_owned();
    }
    format!(
        "FORBIDDEN DISHES AND INGREDIENTS (never include these, under any circumstance): {}.",
        forbidden.join(", ")
    )
}

fn hard_constraints_block(request: &PlanRequest, targets: &MealTargets) -> String {
    format!(
        "HARD CONSTRAINTS:\n\
         - Diet type: {:?}\n\
         - Ketogenic macro split: {}\n\
         - Per-meal carbs target: {:.0} g (range {:.0}-{:.0} g)\n\
         - Per-meal protein target: {:.0} g (range {:.0}-{:.0} g)\n\
         - Per-meal fat target: {:.0} g (range {:.0}-{:.0} g)\n\
         - Daily budget: {:.0} rupees",
        request.profile.diet_type,
        request.is_keto,
        targets.carbs.target_g,
        targets.carbs.low,
        targets.carbs.high,
        targets.protein.target_g,
        targets.protein.low,
        targets.protein.high,
        targets.fat.target_g,
        targets.fat.low,
        targets.fat.high,
        request.budget,
    )
}

/// One compressed excerpt line for a ranked template (spec.md §4.8 item 4:
/// "`mealName`, `state`, one-line macros, brief ingredient cue").
fn excerpt_line(doc: &ScoredDoc) -> String {
    let meta = &doc.document.metadata;
    let name = meta.meal_name.as_deref().unwrap_or(&doc.document.content);
    let state = meta.state.as_deref().unwrap_or("All States");
    let macros = format!(
        "P{:.0}/C{:.0}/F{:.0}",
        meta.protein.unwrap_or(0.0),
        meta.carbs.unwrap_or(0.0),
        meta.fats.unwrap_or(0.0),
    );
    let ingredients = meta
        .ingredient_tags
        .iter()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    format!("- {name} ({state}) [{macros}] {ingredients}")
}

fn guidance_block(request: &PlanRequest) -> Option<String> {
    let mut lines = Vec::new();
    if !request.profile.symptoms.is_empty() {
        lines.push(format!(
            "Symptoms to account for: {}",
            request.profile.symptoms.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !request.profile.goals.is_empty() {
        lines.push(format!(
            "Goals: {}",
            request.profile.goals.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if let Some(labs) = &request.lab_values {
        lines.push(lab_values_line(labs));
    }
    if lines.is_empty() {
        None
    } else {
        Some(format!("GUIDANCE:\n{}", lines.join("\n")))
    }
}

fn lab_values_line(labs: &LabValues) -> String {
    let mut parts = Vec::new();
    if let Some(v) = labs.fasting_glucose {
        parts.push(format!("fasting glucose {v:.0} mg/dL"));
    }
    if let Some(v) = labs.hba1c {
        parts.push(format!("HbA1c {v:.1}%"));
    }
    if let Some(v) = labs.total_cholesterol {
        parts.push(format!("total cholesterol {v:.0} mg/dL"));
    }
    format!("Labeled lab values: {}", parts.join(", "))
}

const OUTPUT_SCHEMA: &str = r#"OUTPUT SCHEMA: respond with strict JSON only, no prose, matching exactly:
{"days": [{"dayNumber": 1, "meals": [{"mealType": "breakfast", "name": "...", "ingredients": [{"item": "...", "quantity": 0, "unit": "g"}], "macros": {"protein": 0, "carbs": 0, "fats": 0}, "calories": 0, "gi": "low", "prepTimeMinutes": 0, "tip": "..."}]}]}"#;

/// Prompt assembly result, retaining which excerpts survived truncation for
/// observability (spec.md §4.8 "Budget discipline").
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// The full prompt text handed to the LLM.
    pub text: String,
    /// Estimated token count of `text`.
    pub estimated_tokens: usize,
    /// Number of top-ranked excerpts actually included.
    pub excerpts_included: usize,
    /// Number of top-ranked excerpts dropped to the budget (spec.md §4.8:
    /// "overflow triggers truncation from least-ranked documents").
    pub excerpts_dropped: usize,
}

/// Assemble a single LLM prompt from `request`, the derived macro `targets`,
/// and the top-ranked `docs` (already sorted best-first; spec.md §4.8).
#[must_use]
pub fn assemble(
    request: &PlanRequest,
    targets: &MealTargets,
    docs: &[ScoredDoc],
    meals_per_day: MealsPerDay,
) -> AssembledPrompt {
    let role = format!(
        "You are an empathetic dietary assistant. Produce a meal plan covering exactly {} day(s) \
         with exactly {} meal(s) per day. Respond with structured JSON only.",
        request.duration.as_u8(),
        meals_per_day.as_u8(),
    );

    let forbidden = forbidden_dishes_block(request);
    let constraints = hard_constraints_block(request, targets);
    let guidance = guidance_block(request);

    let capped_docs = &docs[..docs.len().min(MAX_TEMPLATE_EXCERPTS)];

    let fixed_sections = [
        role.clone(),
        forbidden.clone(),
        constraints.clone(),
        guidance.clone().unwrap_or_default(),
        OUTPUT_SCHEMA.to_owned(),
    ];
    let fixed_tokens: usize = fixed_sections.iter().map(|s| estimate_tokens(s)).sum();
    let budget_for_excerpts = MAX_ESTIMATED_TOKENS.saturating_sub(fixed_tokens);

    let mut excerpt_lines = Vec::with_capacity(capped_docs.len());
    let mut running_tokens = 0usize;
    let mut included = 0usize;
    for doc in capped_docs {
        let line = excerpt_line(doc);
        let line_tokens = estimate_tokens(&line);
        if running_tokens + line_tokens > budget_for_excerpts {
            break;
        }
        running_tokens += line_tokens;
        excerpt_lines.push(line);
        included += 1;
    }
    let dropped = docs.len() - included;

    let excerpts_block = format!(
        "RELEVANT TEMPLATES (ranked, most relevant first):\n{}",
        excerpt_lines.join("\n")
    );

    let mut sections = vec![role, forbidden, constraints, excerpts_block];
    if let Some(guidance) = guidance {
        sections.push(guidance);
    }
    sections.push(OUTPUT_SCHEMA.to_owned());

    let text = sections.join("\n\n");
    let estimated_tokens = estimate_tokens(&text);

    AssembledPrompt {
        text,
        estimated_tokens,
        excerpts_included: included,
        excerpts_dropped: dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmge_core::models::{
        ActivityLevel, Document, DocumentMetadata, DurationDays, UserProfile, WeightGoal,
    };
    use rmge_intelligence::derive;
    use std::collections::BTreeSet;

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
                diet_type: DietType::Vegetarian,
                regions: BTreeSet::new(),
                cuisine_states: BTreeSet::new(),
                allergies: BTreeSet::from(["peanuts".to_owned()]),
                symptoms: BTreeSet::from(["fatigue".to_owned()]),
                goals: BTreeSet::from(["more energy".to_owned()]),
            },
            meals_per_day: MealsPerDay::Three,
            duration: DurationDays::Three,
            budget: 200.0,
            is_keto: false,
            restrictions: BTreeSet::new(),
            forbidden_dishes: BTreeSet::from(["Chicken Biryani".to_owned()]),
            lab_values: None,
            targeted_meal_type: None,
        }
    }

    fn sample_doc(name: &str, score: f32) -> ScoredDoc {
        ScoredDoc::from_similarity(
            Document {
                id: name.to_owned(),
                content: name.to_owned(),
                metadata: DocumentMetadata {
                    meal_name: Some(name.to_owned()),
                    state: Some("Kerala".to_owned()),
                    protein: Some(20.0),
                    carbs: Some(30.0),
                    fats: Some(10.0),
                    ingredient_tags: vec!["oats".to_owned(), "milk".to_owned()],
                    ..Default::default()
                },
            },
            score,
        )
    }

    fn sample_targets() -> MealTargets {
        derive(
            "25-29",
            165.0,
            60.0,
            ActivityLevel::Moderate,
            WeightGoal::Maintain,
            3,
            false,
        )
        .meal_targets
    }

    #[test]
    fn forbidden_block_comes_before_constraints() {
        let request = sample_request();
        let targets = sample_targets();
        let docs = vec![sample_doc("Masala Oats", 0.8)];
        let prompt = assemble(&request, &targets, &docs, MealsPerDay::Three);
        let forbidden_pos = prompt.text.find("FORBIDDEN DISHES").unwrap();
        let constraints_pos = prompt.text.find("HARD CONSTRAINTS").unwrap();
        assert!(forbidden_pos < constraints_pos);
    }

    #[test]
    fn forbidden_block_includes_allergies_and_explicit_list() {
        let request = sample_request();
        let targets = sample_targets();
        let prompt = assemble(&request, &targets, &[], MealsPerDay::Three);
        assert!(prompt.text.contains("peanuts"));
        assert!(prompt.text.contains("Chicken Biryani"));
    }

    #[test]
    fn keto_adds_grain_ban() {
        let mut request = sample_request();
        request.is_keto = true;
        let targets = sample_targets();
        let prompt = assemble(&request, &targets, &[], MealsPerDay::Three);
        assert!(prompt.text.contains("rice"));
        assert!(prompt.text.contains("wheat"));
    }

    #[test]
    fn excerpts_capped_to_twenty() {
        let request = sample_request();
        let targets = sample_targets();
        let docs: Vec<ScoredDoc> = (0..30)
            .map(|i| sample_doc(&format!("Dish {i}"), 0.9 - i as f32 * 0.01))
            .collect();
        let prompt = assemble(&request, &targets, &docs, MealsPerDay::Three);
        assert!(prompt.excerpts_included <= MAX_TEMPLATE_EXCERPTS);
    }

    #[test]
    fn never_truncates_forbidden_or_constraints() {
        let request = sample_request();
        let targets = sample_targets();
        let docs: Vec<ScoredDoc> = (0..20)
            .map(|i| sample_doc(&format!("Dish {i}"), 0.9))
            .collect();
        let prompt = assemble(&request, &targets, &docs, MealsPerDay::Three);
        assert!(prompt.text.contains("FORBIDDEN DISHES"));
        assert!(prompt.text.contains("HARD CONSTRAINTS"));
    }

    #[test]
    fn lab_values_surface_in_guidance() {
        let mut request = sample_request();
        request.lab_values = Some(LabValues {
            fasting_glucose: Some(110.0),
            hba1c: Some(5.8),
            total_cholesterol: None,
        });
        let targets = sample_targets();
        let prompt = assemble(&request, &targets, &[], MealsPerDay::Three);
        assert!(prompt.text.contains("fasting glucose 110"));
    }

    #[test]
    fn token_estimate_uses_four_chars_per_token() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
