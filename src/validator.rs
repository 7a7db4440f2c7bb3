// ABOUTME: Parses LLM output with a bounded repair pass, validates structure/macros/diet bans
// ABOUTME: Soft violations get one targeted repair round; hard violations fall back to template assembly
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::models::{
    Day, DietType, GiLevel, Ingredient, Macros, Meal, MealPlan, MealType, PlanMetadata,
    PlanRequest, PlanSource, ScoredDoc, StageTimings,
};
use rmge_core::RmgeError;
use rmge_intelligence::MealTargets;
use rmge_providers::{CancellationToken, GenerationParams, LlmClient};
use std::sync::Arc;
use tracing::{instrument, warn};

const KETO_FORBIDDEN_GRAINS: [&str; 6] = ["rice", "roti", "wheat", "bread", "potato", "corn"];
const VEGAN_FORBIDDEN: [&str; 4] = ["dairy", "egg", "meat", "fish"];
const JAIN_FORBIDDEN: [&str; 3] = ["onion", "garlic", "root vegetable"];

/// A single structural or macro violation found during validation (spec.md §4.9).
#[derive(Debug, Clone)]
pub enum Violation {
    /// `days.length != duration`.
    DayCountMismatch { expected: u32, actual: usize },
    /// `day.meals.length != mealsPerDay` for a particular day.
    MealCountMismatch { day: u32, expected: u32, actual: usize },
    /// A single meal's macro is outside tolerance, named for the soft repair
    /// round.
    MealMacroOutOfTolerance { day: u32, meal_index: usize, by_pct: f64 },
    /// A day's macro totals are outside the daily reconciliation band.
    DailyReconciliationFailed { day: u32 },
    /// A keto plan includes a banned grain/starch ingredient.
    KetoGrainBan { day: u32, meal_index: usize, token: String },
    /// A vegan plan includes a banned animal-derived ingredient.
    VeganBan { day: u32, meal_index: usize, token: String },
    /// A jain plan includes a banned root-vegetable/allium ingredient.
    JainBan { day: u32, meal_index: usize, token: String },
    /// A meal name appears in the request's forbidden-dishes list.
    ForbiddenMealName { day: u32, meal_index: usize, name: String },
}

impl Violation {
    /// Whether this violation can be addressed by a single-meal repair
    /// round (spec.md §4.9 "Soft: one meal out of tolerance by ≤10%, one
    /// ingredient mis-categorized").
    #[must_use]
    pub fn is_soft(&self) -> bool {
        match self {
            Self::MealMacroOutOfTolerance { by_pct, .. } => *by_pct <= 10.0,
            Self::KetoGrainBan { .. } | Self::VeganBan { .. } | Self::JainBan { .. } => true,
            Self::DayCountMismatch { .. }
            | Self::MealCountMismatch { .. }
            | Self::DailyReconciliationFailed { .. }
            | Self::ForbiddenMealName { .. } => false,
        }
    }

    /// The `(day_number, meal_index)` this violation points at, when it
    /// names a specific meal rather than a structural mismatch.
    #[must_use]
    pub fn meal_location(&self) -> Option<(u32, usize)> {
        match *self {
            Self::MealMacroOutOfTolerance { day, meal_index, .. }
            | Self::KetoGrainBan { day, meal_index, .. }
            | Self::VeganBan { day, meal_index, .. }
            | Self::JainBan { day, meal_index, .. }
            | Self::ForbiddenMealName { day, meal_index, .. } => Some((day, meal_index)),
            Self::DayCountMismatch { .. }
            | Self::MealCountMismatch { .. }
            | Self::DailyReconciliationFailed { .. } => None,
        }
    }
}

/// Try to parse `raw` as a [`MealPlan`], recovering from minor JSON
/// malformation by extracting the largest balanced `{...}` substring
/// (spec.md §4.9 first repair step).
fn parse_json(raw: &str) -> Result<MealPlan, serde_json::Error> {
    match serde_json::from_str::<MealPlan>(raw) {
        Ok(plan) => Ok(plan),
        Err(first_err) => {
            if let Some(extracted) = largest_balanced_braces(raw) {
                serde_json::from_str::<MealPlan>(&extracted)
            } else {
                Err(first_err)
            }
        }
    }
}

/// Extract the longest substring of `raw` that starts at its first `{` and
/// is brace-balanced, ignoring braces inside string literals.
fn largest_balanced_braces(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let start = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut best_end = None;

    for (idx, &byte) in bytes.iter().enumerate().skip(start) {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    best_end = Some(idx + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    best_end.map(|end| raw[start..end].to_owned())
}

fn within_pct(target: f64, actual: f64, pct: f64) -> Option<f64> {
    if target <= 0.0 {
        return None;
    }
    let deviation_pct = ((actual - target).abs() / target) * 100.0;
    if deviation_pct > pct {
        Some(deviation_pct)
    } else {
        None
    }
}

fn ingredient_ban_tokens(ingredients: &[Ingredient], banned: &[&str]) -> Vec<String> {
    let mut hits = Vec::new();
    for ingredient in ingredients {
        let normalized = ingredient.normalized();
        for token in banned {
            if normalized.contains(token) {
                hits.push((*token).to_owned());
            }
        }
    }
    hits
}

/// Validate `plan` against `request`'s diet/keto constraints and `targets`'
/// macro bands (spec.md §4.9 "Structural validation").
#[must_use]
pub fn validate_structure(
    plan: &MealPlan,
    request: &PlanRequest,
    targets: &MealTargets,
    tolerance_pct: f64,
    daily_carb_tol_g: f64,
    daily_pf_tol_g: f64,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let expected_days = request.duration.as_u8() as u32;
    let expected_meals = request.meals_per_day.as_u8() as u32;

    if plan.days.len() != expected_days as usize {
        violations.push(Violation::DayCountMismatch {
            expected: expected_days,
            actual: plan.days.len(),
        });
    }

    for day in &plan.days {
        if day.meals.len() != expected_meals as usize {
            violations.push(Violation::MealCountMismatch {
                day: day.day_number,
                expected: expected_meals,
                actual: day.meals.len(),
            });
        }

        for (meal_index, meal) in day.meals.iter().enumerate() {
            if request.forbidden_dishes.iter().any(|f| f.eq_ignore_ascii_case(&meal.name)) {
                violations.push(Violation::ForbiddenMealName {
                    day: day.day_number,
                    meal_index,
                    name: meal.name.clone(),
                });
            }

            for (target, actual, label) in [
                (targets.carbs.target_g, meal.macros.carbs, "carbs"),
                (targets.protein.target_g, meal.macros.protein, "protein"),
                (targets.fat.target_g, meal.macros.fats, "fat"),
            ] {
                let _ = label;
                if let Some(by_pct) = within_pct(target, actual, tolerance_pct) {
                    violations.push(Violation::MealMacroOutOfTolerance {
                        day: day.day_number,
                        meal_index,
                        by_pct,
                    });
                }
            }

            if request.is_keto {
                for token in ingredient_ban_tokens(&meal.ingredients, &KETO_FORBIDDEN_GRAINS) {
                    violations.push(Violation::KetoGrainBan {
                        day: day.day_number,
                        meal_index,
                        token,
                    });
                }
            }
            match request.profile.diet_type {
                DietType::Vegan => {
                    for token in ingredient_ban_tokens(&meal.ingredients, &VEGAN_FORBIDDEN) {
                        violations.push(Violation::VeganBan {
                            day: day.day_number,
                            meal_index,
                            token,
                        });
                    }
                }
                DietType::Jain => {
                    for token in ingredient_ban_tokens(&meal.ingredients, &JAIN_FORBIDDEN) {
                        violations.push(Violation::JainBan {
                            day: day.day_number,
                            meal_index,
                            token,
                        });
                    }
                }
                DietType::Vegetarian | DietType::NonVegetarian | DietType::Eggetarian => {}
            }
        }

        let totals = day.totals();
        let daily_carb_target = targets.carbs.target_g * f64::from(expected_meals);
        let daily_protein_target = targets.protein.target_g * f64::from(expected_meals);
        let daily_fat_target = targets.fat.target_g * f64::from(expected_meals);

        let carb_ok = (totals.carbs - daily_carb_target).abs() <= daily_carb_tol_g;
        let protein_ok = (totals.protein - daily_protein_target).abs() <= daily_pf_tol_g;
        let fat_ok = (totals.fats - daily_fat_target).abs() <= daily_pf_tol_g;
        if !(carb_ok && protein_ok && fat_ok) {
            violations.push(Violation::DailyReconciliationFailed { day: day.day_number });
        }
    }

    violations
}

/// Whether every violation in `violations` is soft-repairable, and all
/// point at distinct meals within a single day so the spec's "single
/// offending meal" repair round applies (spec.md §4.9).
#[must_use]
pub fn is_repairable_in_one_round(violations: &[Violation]) -> bool {
    !violations.is_empty() && violations.iter().all(Violation::is_soft)
}

/// Build the terse "fix JSON" regeneration prompt (spec.md §4.9 second
/// repair step).
#[must_use]
pub fn fix_json_prompt(raw: &str) -> String {
    format!(
        "The following text was supposed to be a single JSON object but failed to parse. \
         Return ONLY the corrected, valid JSON object, with no commentary:\n\n{raw}"
    )
}

/// Build a targeted repair prompt for the single offending meal (spec.md
/// §4.9 "send back the single offending meal and ask for a revision").
#[must_use]
pub fn meal_repair_prompt(meal: &Meal, reason: &str) -> String {
    let meal_json = serde_json::to_string(meal).unwrap_or_default();
    format!(
        "The following meal JSON violates a constraint: {reason}. Return ONLY a corrected JSON \
         object for this single meal, preserving its mealType, with no commentary:\n\n{meal_json}"
    )
}

/// Parses LLM completions into validated [`MealPlan`]s, repairing malformed
/// JSON and soft structural violations before surfacing [`RmgeError::Parse`]
/// (spec.md §4.9).
pub struct Validator {
    llm: Arc<LlmClient>,
}

impl Validator {
    /// Build a validator around the given LLM client, used for the bounded
    /// JSON-fix and single-meal repair rounds.
    #[must_use]
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }

    /// Parse `raw`, attempting the balanced-brace repair and then a single
    /// "fix JSON" regeneration round before giving up (spec.md §4.9: "on
    /// third failure, surface `ParseError`").
    ///
    /// # Errors
    ///
    /// Returns [`RmgeError::Parse`] if all three attempts fail, or the LLM
    /// error if the fix-json regeneration call itself fails.
    #[instrument(skip(self, raw, cancel))]
    pub async fn parse_with_repair(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<MealPlan, RmgeError> {
        if let Ok(plan) = parse_json(raw) {
            return Ok(plan);
        }
        warn!("initial JSON parse failed, attempting fix-json regeneration");

        let params = GenerationParams::default();
        let completion = self
            .llm
            .generate(&fix_json_prompt(raw), &params, cancel)
            .await
            .map_err(rmge_core::RmgeError::from)?;

        parse_json(&completion.text).map_err(|err| {
            RmgeError::Parse {
                message: format!("LLM output could not be parsed after repair: {err}"),
            }
        })
    }

    /// Attempt the single-round meal repair for a soft violation, returning
    /// the revised plan with the offending meal replaced (spec.md §4.9
    /// "accept up to one round").
    ///
    /// # Errors
    ///
    /// Propagates LLM or parse failures from the repair call.
    #[instrument(skip(self, plan, cancel))]
    pub async fn repair_meal(
        &self,
        mut plan: MealPlan,
        day_number: u32,
        meal_index: usize,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<MealPlan, RmgeError> {
        let day = plan
            .days
            .iter_mut()
            .find(|d| d.day_number == day_number)
            .ok_or_else(|| RmgeError::GenerationFailed {
                message: format!("repair target day {day_number} not found"),
            })?;
        let meal = day.meals.get(meal_index).ok_or_else(|| RmgeError::GenerationFailed {
            message: format!("repair target meal index {meal_index} not found"),
        })?;

        let params = GenerationParams::default();
        let completion = self
            .llm
            .generate(&meal_repair_prompt(meal, reason), &params, cancel)
            .await
            .map_err(rmge_core::RmgeError::from)?;

        let revised: Meal = serde_json::from_str(&completion.text)
            .or_else(|_| {
                largest_balanced_braces(&completion.text)
                    .ok_or_else(|| serde_json::from_str::<Meal>("").unwrap_err())
                    .and_then(|s| serde_json::from_str(&s))
            })
            .map_err(|err| RmgeError::Parse {
                message: format!("meal repair output could not be parsed: {err}"),
            })?;

        day.meals[meal_index] = revised;
        Ok(plan)
    }
}

/// Deterministically assemble a [`MealPlan`] from ranked candidates when the
/// LLM path is exhausted (spec.md §4.9 "fall back to deterministic template
/// assembly from re-ranked candidates filling meal slots by `mealType`").
#[must_use]
pub fn assemble_fallback_plan(
    docs: &[ScoredDoc],
    request: &PlanRequest,
    retrieved_count: usize,
    filtered_count: usize,
    timings: StageTimings,
) -> MealPlan {
    let meal_types = meal_slots(request);
    let mut by_type: std::collections::BTreeMap<MealType, Vec<&ScoredDoc>> =
        std::collections::BTreeMap::new();
    for doc in docs {
        if let Some(meal_type) = doc.document.metadata.meal_type {
            by_type.entry(meal_type).or_default().push(doc);
        }
    }

    let duration = request.duration.as_u8();
    let mut cursors: std::collections::BTreeMap<MealType, usize> =
        meal_types.iter().map(|m| (*m, 0usize)).collect();

    let mut days = Vec::with_capacity(duration as usize);
    for day_number in 1..=u32::from(duration) {
        let mut meals = Vec::with_capacity(meal_types.len());
        for meal_type in &meal_types {
            let candidates = by_type.get(meal_type).map(Vec::as_slice).unwrap_or(&[]);
            let cursor = cursors.entry(*meal_type).or_insert(0);
            let candidate = candidates.get(*cursor % candidates.len().max(1)).or_else(|| docs.first());
            *cursor += 1;
            meals.push(build_meal_from_candidate(*meal_type, candidate.copied()));
        }
        days.push(Day { day_number, meals });
    }

    MealPlan {
        days,
        metadata: PlanMetadata {
            source: PlanSource::TemplateFallback,
            retrieved_count,
            filtered_count,
            timings,
        },
    }
}

fn meal_slots(request: &PlanRequest) -> Vec<MealType> {
    let count = request.meals_per_day.as_u8();
    let order = [MealType::Breakfast, MealType::Lunch, MealType::Dinner, MealType::Snack];
    order.into_iter().take(count as usize).collect()
}

fn build_meal_from_candidate(meal_type: MealType, candidate: Option<&ScoredDoc>) -> Meal {
    let Some(doc) = candidate else {
        return Meal {
            meal_type,
            name: "Plain rice and dal".to_owned(),
            ingredients: vec![Ingredient::named("rice"), Ingredient::named("dal")],
            macros: Macros::default(),
            calories: 0.0,
            gi: None,
            prep_time_minutes: None,
            tip: None,
        };
    };
    let meta = &doc.document.metadata;
    let macros = Macros {
        protein: meta.protein.unwrap_or(0.0),
        carbs: meta.net_carbs().unwrap_or(0.0),
        fats: meta.fats.unwrap_or(0.0),
    };
    Meal {
        meal_type,
        name: meta
            .meal_name
            .clone()
            .unwrap_or_else(|| doc.document.content.clone()),
        ingredients: meta
            .ingredient_tags
            .iter()
            .map(|tag| Ingredient::named(tag.clone()))
            .collect(),
        calories: meta.calories.unwrap_or_else(|| macros.implied_calories()),
        macros,
        gi: meta.gi,
        prep_time_minutes: meta.prep_time_minutes(),
        tip: None,
    }
}
