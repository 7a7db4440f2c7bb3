// ABOUTME: Output meal plan types returned by the orchestrator to the caller
// ABOUTME: Ephemeral within the core; persistence is the caller's responsibility (spec.md §3)

use super::document::{GiLevel, MealType};
use serde::{Deserialize, Serialize};

/// Macro breakdown for a single meal or day (spec.md §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macros {
    /// Protein, grams.
    pub protein: f64,
    /// Carbohydrates, grams.
    pub carbs: f64,
    /// Fat, grams.
    pub fats: f64,
}

impl Macros {
    /// Calories implied by `4p + 4c + 9f` (spec.md §3 invariant).
    #[must_use]
    pub fn implied_calories(&self) -> f64 {
        4.0 * self.protein + 4.0 * self.carbs + 9.0 * self.fats
    }
}

/// A single ingredient line (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name.
    pub item: String,
    /// Quantity, when the source supplied one.
    pub quantity: Option<f64>,
    /// Unit for `quantity` (e.g. `"g"`, `"cup"`).
    pub unit: Option<String>,
}

impl Ingredient {
    /// Build a bare ingredient reference with no quantity information, for
    /// sources that only supply free-text ingredient names.
    #[must_use]
    pub fn named(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            quantity: None,
            unit: None,
        }
    }

    /// Lowercased ingredient name, used for ban-list token matching.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.item.to_lowercase()
    }
}

/// One meal within a [`Day`] (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    /// Which slot this meal fills.
    pub meal_type: MealType,
    /// Dish name.
    pub name: String,
    /// Ordered ingredient list.
    pub ingredients: Vec<Ingredient>,
    /// Macro breakdown.
    pub macros: Macros,
    /// Total calories.
    pub calories: f64,
    /// Glycemic index category, when known.
    pub gi: Option<GiLevel>,
    /// Preparation time in minutes.
    pub prep_time_minutes: Option<u32>,
    /// Short practical tip surfaced to the user.
    pub tip: Option<String>,
}

/// One day within a [`MealPlan`] (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    /// 1-based day index within the plan.
    pub day_number: u32,
    /// Meals for this day, in slot order.
    pub meals: Vec<Meal>,
}

impl Day {
    /// Macro totals summed across all meals in the day.
    #[must_use]
    pub fn totals(&self) -> Macros {
        self.meals.iter().fold(Macros::default(), |mut acc, meal| {
            acc.protein += meal.macros.protein;
            acc.carbs += meal.macros.carbs;
            acc.fats += meal.macros.fats;
            acc
        })
    }
}

/// Where a plan came from, surfaced so callers can distinguish a fully
/// LLM-authored plan from a deterministic fallback (spec.md §4.9, §8 S5).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanSource {
    /// Produced directly from a validated LLM response.
    LlmGenerated,
    /// Produced from a single targeted repair round after a soft violation.
    LlmRepaired,
    /// Assembled deterministically from ranked retrieval candidates after a
    /// hard validation failure. The placeholder value before the
    /// orchestrator overwrites it once the plan's true origin is known.
    #[default]
    TemplateFallback,
}

/// Per-stage timing recorded by the orchestrator (spec.md §4.11 step 12,
/// §9 "Metrics").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Query expansion duration, milliseconds.
    pub expand_ms: u64,
    /// Combined embedding duration across variants, milliseconds.
    pub embed_ms: u64,
    /// Combined similarity search duration, milliseconds.
    pub retrieve_ms: u64,
    /// Filter + dedup + rerank duration, milliseconds.
    pub rank_ms: u64,
    /// Prompt assembly + LLM call duration, milliseconds.
    pub generate_ms: u64,
    /// Validation (and repair, if any) duration, milliseconds.
    pub validate_ms: u64,
    /// Total wall-clock duration for the whole request, milliseconds.
    pub total_ms: u64,
}

/// Metadata accompanying a generated plan (spec.md §4.11 step 12).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// How the plan was produced.
    pub source: PlanSource,
    /// Number of documents retrieved before filtering.
    pub retrieved_count: usize,
    /// Number of documents remaining after filter + dedup.
    pub filtered_count: usize,
    /// Per-stage timings.
    pub timings: StageTimings,
}

/// The generated meal plan (spec.md §3). Ordered days, each an ordered
/// sequence of meals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlan {
    /// Days in order.
    pub days: Vec<Day>,
    /// How this plan was produced and how long it took. Never supplied by
    /// the language model: the prompt's output schema asks only for `days`,
    /// and the orchestrator fills this in once the plan's true source and
    /// timings are known (spec.md §4.8, §4.11 step 12).
    #[serde(default)]
    pub metadata: PlanMetadata,
}
