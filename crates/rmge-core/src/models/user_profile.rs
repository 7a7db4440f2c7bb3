// ABOUTME: User profile type consumed by MacroPlanner and the retrieval preference translation
// ABOUTME: Derived numeric fields (BMR/TDEE/target) are never trusted from the caller (spec.md §3)

use super::document::DietType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Self-reported activity level (spec.md §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// Little to no exercise.
    Sedentary,
    /// Light exercise 1-3 days/week.
    Light,
    /// Moderate exercise 3-5 days/week.
    Moderate,
    /// Heavy exercise 6-7 days/week.
    Very,
}

impl ActivityLevel {
    /// TDEE multiplier for this activity level (spec.md §4.7, exact values).
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.465,
            Self::Very => 1.55,
        }
    }
}

/// Direction the user wants their weight to move (spec.md §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightGoal {
    /// Hold current weight: daily target equals TDEE.
    Maintain,
    /// Lose weight: daily target is TDEE minus 500 kcal.
    Lose,
    /// Gain weight: daily target is TDEE plus 500 kcal.
    Gain,
}

/// A user's profile as owned by an external repository; the core only reads
/// it (spec.md §3 "Lifecycles").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Opaque user identifier, owned by the external repository.
    pub user_id: String,
    /// Age bucket label, e.g. `"25-29"`; see `macro_planner::age_midpoint`.
    pub age_range: String,
    /// Height in centimeters.
    pub height_cm: f64,
    /// Weight in kilograms.
    pub weight_kg: f64,
    /// Target weight in kilograms, informational only.
    pub target_weight_kg: Option<f64>,
    /// Self-reported activity level.
    pub activity_level: ActivityLevel,
    /// Desired weight trajectory.
    pub weight_goal: WeightGoal,
    /// Primary diet constraint.
    pub diet_type: DietType,
    /// Regions the user is willing to accept templates from.
    pub regions: BTreeSet<String>,
    /// Cuisine states of particular interest (used to build the base query).
    pub cuisine_states: BTreeSet<String>,
    /// Known allergies, contributing to the forbidden-dishes block.
    pub allergies: BTreeSet<String>,
    /// Reported symptoms, fed into prompt guidance.
    pub symptoms: BTreeSet<String>,
    /// Free-form goals (e.g. `"more energy"`), fed into prompt guidance.
    pub goals: BTreeSet<String>,
}
