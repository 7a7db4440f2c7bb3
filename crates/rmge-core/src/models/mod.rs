// ABOUTME: Data model module tree (spec.md §3)

/// Documents retrieved from the vector index and their metadata.
pub mod document;
/// Output meal plan types.
pub mod meal_plan;
/// A request to generate a plan.
pub mod plan_request;
/// Per-user quota/plan record.
pub mod quota_state;
/// Document plus retrieval/rerank scores.
pub mod scored_doc;
/// Caller-owned user profile.
pub mod user_profile;

pub use document::{DietType, Document, DocumentMetadata, GiLevel, MealType, ALL_STATES};
pub use meal_plan::{Day, Ingredient, Macros, Meal, MealPlan, PlanMetadata, PlanSource, StageTimings};
pub use plan_request::{DurationDays, LabValues, MealsPerDay, PlanRequest};
pub use quota_state::{Plan, QuotaState, SubscriptionStatus};
pub use scored_doc::ScoredDoc;
pub use user_profile::{ActivityLevel, UserProfile, WeightGoal};
