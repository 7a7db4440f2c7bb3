// ABOUTME: Pure arithmetic: BMR, TDEE, daily calorie target, macro distribution, tolerance bands
// ABOUTME: Grounded on the teacher's Mifflin-St Jeor nutrition calculator, narrowed to one formula
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Daily nutrition target derivation (spec.md §4.7).
//!
//! # Reference
//!
//! Mifflin, M.D., et al. (1990). A new predictive equation for resting energy
//! expenditure. *American Journal of Clinical Nutrition*, 51(2), 241-247.
//! <https://doi.org/10.1093/ajcn/51.2.241>

use rmge_core::constants::macros as c;
use rmge_core::models::{ActivityLevel, WeightGoal};

/// Midpoint age in years for a free-form age-range string, per the closed
/// bin table in spec.md §4.7. Unrecognized ranges default to 30.
#[must_use]
pub fn age_midpoint(age_range: &str) -> u32 {
    match age_range.trim() {
        "18-24" => 21,
        "25-29" => 27,
        "30-34" => 32,
        "35-39" => 37,
        "40-45" => 42,
        "56+" => 60,
        _ => 30,
    }
}

/// Basal metabolic rate via Mifflin-St Jeor, female coefficients (spec.md
/// §4.7: the engine's user base is treated as female-coefficient throughout,
/// matching the formula the spec pins).
#[must_use]
pub fn bmr(weight_kg: f64, height_cm: f64, age_years: u32) -> f64 {
    c::MSJ_WEIGHT_COEF * weight_kg + c::MSJ_HEIGHT_COEF * height_cm
        - c::MSJ_AGE_COEF * f64::from(age_years)
        + c::MSJ_FEMALE_CONSTANT
}

/// Total daily energy expenditure: `round(bmr * activity_multiplier)`.
#[must_use]
pub fn tdee(bmr_value: f64, activity_level: ActivityLevel) -> f64 {
    (bmr_value * activity_level.multiplier()).round()
}

/// Daily calorie target: TDEE adjusted by the weight goal delta.
#[must_use]
pub fn daily_calorie_target(tdee_value: f64, goal: WeightGoal) -> f64 {
    match goal {
        WeightGoal::Lose => tdee_value + c::LOSE_CALORIE_DELTA,
        WeightGoal::Gain => tdee_value + c::GAIN_CALORIE_DELTA,
        WeightGoal::Maintain => tdee_value,
    }
}

/// BMI, rounded to one decimal place (SPEC_FULL.md §1: exposed alongside the
/// rest of the derived targets for reporting).
#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    ((weight_kg / (height_m * height_m)) * 10.0).round() / 10.0
}

/// Macronutrient percentage split as (carbs%, protein%, fat%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroSplit {
    /// Carbohydrate percentage of total calories.
    pub carbs_pct: f64,
    /// Protein percentage of total calories.
    pub protein_pct: f64,
    /// Fat percentage of total calories.
    pub fat_pct: f64,
}

impl MacroSplit {
    /// Keto distribution: 7% carbs, 30% protein, 63% fat.
    #[must_use]
    pub const fn keto() -> Self {
        Self {
            carbs_pct: 7.0,
            protein_pct: 30.0,
            fat_pct: 63.0,
        }
    }

    /// Balanced, PCOS-optimized distribution: 35% carbs, 35% protein, 30% fat.
    #[must_use]
    pub const fn balanced() -> Self {
        Self {
            carbs_pct: 35.0,
            protein_pct: 35.0,
            fat_pct: 30.0,
        }
    }

    /// Select the split for a request: keto overrides the balanced default.
    #[must_use]
    pub const fn for_request(is_keto: bool) -> Self {
        if is_keto {
            Self::keto()
        } else {
            Self::balanced()
        }
    }
}

/// Daily grams for each macro, derived from `daily_calories` and `split`
/// (carbs/protein at 4 kcal/g, fat at 9 kcal/g).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyGrams {
    /// Grams of carbohydrate for the day.
    pub carbs_g: f64,
    /// Grams of protein for the day.
    pub protein_g: f64,
    /// Grams of fat for the day.
    pub fat_g: f64,
}

#[must_use]
pub fn daily_grams(daily_calories: f64, split: MacroSplit) -> DailyGrams {
    DailyGrams {
        carbs_g: (daily_calories * split.carbs_pct / 100.0) / 4.0,
        protein_g: (daily_calories * split.protein_pct / 100.0) / 4.0,
        fat_g: (daily_calories * split.fat_pct / 100.0) / 9.0,
    }
}

/// Per-meal macro target, rounded, plus its ±3% tolerance band (spec.md
/// §4.7, §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MealTarget {
    /// Rounded target grams for this macro.
    pub target_g: f64,
    /// Lower bound of the ±3% tolerance band.
    pub low: f64,
    /// Upper bound of the ±3% tolerance band.
    pub high: f64,
}

impl MealTarget {
    fn from_daily(daily_g: f64, meals_per_day: u8) -> Self {
        let target = (daily_g / f64::from(meals_per_day)).round();
        let band = target * c::PER_MEAL_TOLERANCE_PCT / 100.0;
        Self {
            target_g: target,
            low: target - band,
            high: target + band,
        }
    }

    /// Whether `actual_g` falls within the tolerance band.
    #[must_use]
    pub fn within_tolerance(&self, actual_g: f64) -> bool {
        actual_g >= self.low && actual_g <= self.high
    }
}

/// Per-meal targets for all three macros.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MealTargets {
    /// Carbohydrate target and tolerance.
    pub carbs: MealTarget,
    /// Protein target and tolerance.
    pub protein: MealTarget,
    /// Fat target and tolerance.
    pub fat: MealTarget,
}

#[must_use]
pub fn meal_targets(daily: DailyGrams, meals_per_day: u8) -> MealTargets {
    MealTargets {
        carbs: MealTarget::from_daily(daily.carbs_g, meals_per_day),
        protein: MealTarget::from_daily(daily.protein_g, meals_per_day),
        fat: MealTarget::from_daily(daily.fat_g, meals_per_day),
    }
}

/// Daily reconciliation bands: summed-across-day actuals must fall within
/// ±2 g carbs, ±5 g protein/fat of the daily target (spec.md §3 invariant).
#[must_use]
pub fn within_daily_reconciliation(daily: DailyGrams, actual: DailyGrams) -> bool {
    (actual.carbs_g - daily.carbs_g).abs() <= c::DAILY_CARB_TOLERANCE_G
        && (actual.protein_g - daily.protein_g).abs() <= c::DAILY_PF_TOLERANCE_G
        && (actual.fat_g - daily.fat_g).abs() <= c::DAILY_PF_TOLERANCE_G
}

/// Keto carb allowance per day: the spec's fixed ceiling, independent of the
/// macro-split arithmetic (spec.md §4.7 "keto carb allowance").
#[must_use]
pub const fn keto_daily_carb_max_g() -> f64 {
    c::KETO_DAILY_CARB_MAX_G
}

/// Full set of derived targets for one user/request (SPEC_FULL.md §1,
/// grouping every MacroPlanner output the orchestrator needs in one place).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedTargets {
    /// Basal metabolic rate, kcal/day.
    pub bmr: f64,
    /// Total daily energy expenditure, kcal/day.
    pub tdee: f64,
    /// Daily calorie target after goal adjustment, kcal/day.
    pub daily_calories: f64,
    /// Body mass index, rounded to 1 dp.
    pub bmi: f64,
    /// Macro split applied (keto or balanced).
    pub split: MacroSplit,
    /// Daily grams for each macro.
    pub daily_grams: DailyGrams,
    /// Per-meal targets and tolerance bands.
    pub meal_targets: MealTargets,
}

/// Derive the complete target set for one user/request (spec.md §4.11 step
/// 2: "MacroPlanner.derive").
#[must_use]
pub fn derive(
    age_range: &str,
    height_cm: f64,
    weight_kg: f64,
    activity_level: ActivityLevel,
    weight_goal: WeightGoal,
    meals_per_day: u8,
    is_keto: bool,
) -> DerivedTargets {
    let age = age_midpoint(age_range);
    let bmr_value = bmr(weight_kg, height_cm, age);
    let tdee_value = tdee(bmr_value, activity_level);
    let daily_calories = daily_calorie_target(tdee_value, weight_goal);
    let split = MacroSplit::for_request(is_keto);
    let daily = daily_grams(daily_calories, split);
    let targets = meal_targets(daily, meals_per_day);

    DerivedTargets {
        bmr: bmr_value,
        tdee: tdee_value,
        daily_calories,
        bmi: bmi(weight_kg, height_cm),
        split,
        daily_grams: daily,
        meal_targets: targets,
    }
}
