// ABOUTME: Document and metadata types retrieved from the vector index
// ABOUTME: Known fields are tagged; anything else lands in the untyped side-map (spec.md §9)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diet compatibility classes recognized by the engine (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietType {
    /// Contains no meat or fish, may contain dairy/egg.
    Vegetarian,
    /// Contains meat and/or fish.
    NonVegetarian,
    /// Contains no animal products at all.
    Vegan,
    /// Jain dietary rules: no root vegetables, onion, or garlic.
    Jain,
    /// Vegetarian plus egg.
    Eggetarian,
}

impl DietType {
    /// Parse a free-form, case-insensitive diet label.
    #[must_use]
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "vegetarian" | "veg" => Some(Self::Vegetarian),
            "non-vegetarian" | "non vegetarian" | "nonveg" | "non-veg" => {
                Some(Self::NonVegetarian)
            }
            "vegan" => Some(Self::Vegan),
            "jain" => Some(Self::Jain),
            "eggetarian" | "egg" => Some(Self::Eggetarian),
            _ => None,
        }
    }

    /// Diet types that satisfy a vegetarian-or-stricter constraint
    /// (spec.md §4.4 preference translation).
    #[must_use]
    pub const fn vegetarian_compatible() -> [Self; 3] {
        [Self::Vegetarian, Self::Vegan, Self::Eggetarian]
    }
}

/// Glycemic index category (spec.md §3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiLevel {
    /// Low glycemic index.
    Low,
    /// Medium glycemic index.
    Medium,
    /// High glycemic index.
    High,
}

impl GiLevel {
    /// Parse a free-form, case-insensitive GI label.
    #[must_use]
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Meal slot within a day (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    /// Morning meal.
    Breakfast,
    /// Midday meal.
    Lunch,
    /// Evening meal.
    Dinner,
    /// Between-meal snack.
    Snack,
}

impl MealType {
    /// Parse a free-form, case-insensitive meal type label.
    #[must_use]
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "breakfast" => Some(Self::Breakfast),
            "lunch" => Some(Self::Lunch),
            "dinner" => Some(Self::Dinner),
            "snack" => Some(Self::Snack),
            _ => None,
        }
    }
}

/// Region a template applies to; the sentinel `"All States"` means it
/// applies everywhere and is subordinated to any state-specific variant
/// of the same dish by the deduplicator (spec.md §4.5, GLOSSARY).
pub const ALL_STATES: &str = "All States";

/// Tagged metadata fields recognized by the core, plus an untyped side-map
/// for forward-compatible keys the index may carry (spec.md §9).
///
/// At the storage boundary, sequence-valued fields are joined with `", "`
/// and object-valued fields are serialized to a JSON string (spec.md §3,
/// §4.2); this type holds the already-deserialized scalar view the core
/// consumes, with [`DocumentMetadata::ingredient_tags`] retaining the
/// parsed sequence for keto/vegan/jain ingredient-ban checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Canonical dish name.
    pub meal_name: Option<String>,
    /// Region, or `"All States"`.
    pub state: Option<String>,
    /// Meal slot this template is suited for.
    pub meal_type: Option<MealType>,
    /// Diet compatibility class.
    pub diet_type: Option<DietType>,
    /// Glycemic index category.
    pub gi: Option<GiLevel>,
    /// Protein per serving, grams.
    pub protein: Option<f64>,
    /// Carbohydrates per serving, grams.
    pub carbs: Option<f64>,
    /// Fat per serving, grams.
    pub fats: Option<f64>,
    /// Fiber per serving, grams, when known (used for net-carb computation).
    pub fiber: Option<f64>,
    /// Calories per serving, kcal.
    pub calories: Option<f64>,
    /// Raw preparation time string (e.g. `"30 mins"`, `"1.5 hrs"`).
    pub prep_time: Option<String>,
    /// Whether the template is flagged budget-friendly.
    pub budget_friendly: Option<bool>,
    /// Minimum cost to prepare, rupees.
    pub budget_min: Option<f64>,
    /// Maximum cost to prepare, rupees.
    pub budget_max: Option<f64>,
    /// Free-form category label.
    pub category: Option<String>,
    /// Parsed ingredient tokens, lowercased, for ban-list checks.
    pub ingredient_tags: Vec<String>,
    /// Any index-supplied fields not recognized above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Parse `prep_time` into whole minutes. Returns `None` when the string
    /// is absent or unparseable; unparseable values must *pass* the
    /// `maxPrepTime` filter rather than being excluded (spec.md §4.4).
    #[must_use]
    pub fn prep_time_minutes(&self) -> Option<u32> {
        parse_prep_time_minutes(self.prep_time.as_deref()?)
    }

    /// Net carbs: `carbs - fiber` when fiber is known, else total carbs
    /// (spec.md §9 open question, resolved in favor of net-carbs-when-known).
    #[must_use]
    pub fn net_carbs(&self) -> Option<f64> {
        let carbs = self.carbs?;
        Some(match self.fiber {
            Some(fiber) => (carbs - fiber).max(0.0),
            None => carbs,
        })
    }
}

/// Parse natural-language prep time strings into minutes (spec.md §3).
///
/// Recognizes forms like `"30 mins"`, `"1 hour"`, `"1.5 hrs"`. Returns
/// `None` for anything it cannot confidently parse.
#[must_use]
pub fn parse_prep_time_minutes(raw: &str) -> Option<u32> {
    let lower = raw.trim().to_lowercase();
    let mut digits = String::new();
    let mut unit_start = 0;
    for (idx, ch) in lower.char_indices() {
        if ch.is_ascii_digit() || ch == '.' {
            digits.push(ch);
            unit_start = idx + ch.len_utf8();
        } else if ch.is_whitespace() && digits.is_empty() {
            continue;
        } else {
            break;
        }
    }
    if digits.is_empty() {
        return None;
    }
    let value: f64 = digits.parse().ok()?;
    let unit = lower[unit_start..].trim();

    let minutes = if unit.starts_with("hour") || unit.starts_with("hr") || unit.starts_with('h') {
        value * 60.0
    } else if unit.starts_with("min") || unit.is_empty() {
        value
    } else {
        return None;
    };

    if minutes.is_finite() && minutes >= 0.0 {
        Some(minutes.round() as u32)
    } else {
        None
    }
}

/// A retrieved template: content plus its recognized and side-map metadata
/// (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the index.
    pub id: String,
    /// Canonical content string (normalized at upsert time, spec.md §4.2).
    pub content: String,
    /// Tagged + side-map metadata.
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Normalize `meal_name` for grouping/dedup purposes: trimmed, lowercased,
    /// internal whitespace collapsed.
    #[must_use]
    pub fn normalized_meal_name(&self) -> String {
        self.metadata
            .meal_name
            .as_deref()
            .unwrap_or(&self.content)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Whether this document's `state` is the `"All States"` sentinel.
    #[must_use]
    pub fn is_all_states(&self) -> bool {
        self.metadata
            .state
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(ALL_STATES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_form() {
        assert_eq!(parse_prep_time_minutes("30 mins"), Some(30));
        assert_eq!(parse_prep_time_minutes("45 minutes"), Some(45));
    }

    #[test]
    fn parses_hour_forms() {
        assert_eq!(parse_prep_time_minutes("1 hour"), Some(60));
        assert_eq!(parse_prep_time_minutes("1.5 hrs"), Some(90));
        assert_eq!(parse_prep_time_minutes("2h"), Some(120));
    }

    #[test]
    fn unparseable_returns_none() {
        assert_eq!(parse_prep_time_minutes("quick"), None);
        assert_eq!(parse_prep_time_minutes(""), None);
    }

    #[test]
    fn net_carbs_prefers_fiber_subtraction() {
        let meta = DocumentMetadata {
            carbs: Some(40.0),
            fiber: Some(8.0),
            ..Default::default()
        };
        assert_eq!(meta.net_carbs(), Some(32.0));
    }

    #[test]
    fn net_carbs_falls_back_to_total_without_fiber() {
        let meta = DocumentMetadata {
            carbs: Some(40.0),
            ..Default::default()
        };
        assert_eq!(meta.net_carbs(), Some(40.0));
    }
}
