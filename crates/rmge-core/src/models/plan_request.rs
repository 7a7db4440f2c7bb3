// ABOUTME: Inbound request to generate a meal plan: a UserProfile projection plus plan parameters

use super::user_profile::UserProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of meals per day the plan must contain (spec.md §3: `{2,3,4}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MealsPerDay {
    /// Two meals per day.
    Two = 2,
    /// Three meals per day.
    Three = 3,
    /// Four meals per day.
    Four = 4,
}

impl MealsPerDay {
    /// Numeric value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Plan duration in days (spec.md §3: `{3,5,7}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DurationDays {
    /// Three-day plan.
    Three = 3,
    /// Five-day plan.
    Five = 5,
    /// Seven-day plan.
    Seven = 7,
}

impl DurationDays {
    /// Numeric value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Optional lab values the user may supply (spec.md §3, §4.8 "labeled lab values").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabValues {
    /// Fasting blood glucose, mg/dL.
    pub fasting_glucose: Option<f64>,
    /// HbA1c, percent.
    pub hba1c: Option<f64>,
    /// Total cholesterol, mg/dL.
    pub total_cholesterol: Option<f64>,
}

/// A single `generate_plan` request (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    /// The requesting user's profile.
    pub profile: UserProfile,
    /// Meals per day the plan must contain.
    pub meals_per_day: MealsPerDay,
    /// Number of days the plan must cover.
    pub duration: DurationDays,
    /// Daily budget, rupees.
    pub budget: f64,
    /// Whether the plan must follow a ketogenic macro split.
    pub is_keto: bool,
    /// Additional free-form dietary restrictions.
    pub restrictions: BTreeSet<String>,
    /// Dish names that must never appear in the plan.
    pub forbidden_dishes: BTreeSet<String>,
    /// Optional lab values informing prompt guidance.
    pub lab_values: Option<LabValues>,
    /// Optional targeted meal type for the retrieval query (e.g. a single
    /// "breakfast ideas" request rather than a full day plan).
    pub targeted_meal_type: Option<super::document::MealType>,
}
