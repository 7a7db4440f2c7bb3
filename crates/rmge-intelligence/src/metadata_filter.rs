// ABOUTME: Pure predicate composition over document metadata, plus preference-to-filter translation
// ABOUTME: Order-preserving and side-effect-free; cumulative stats are tracked by the caller's handle
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::models::{DietType, Document, GiLevel, MealType};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A field constraint: match anything, exactly one value, or any of a set
/// (spec.md §4.4: "single value, a set of allowed values, or the wildcard
/// `any`").
#[derive(Debug, Clone, Default)]
pub enum FieldFilter<T> {
    /// No constraint on this field.
    #[default]
    Any,
    /// Must equal this exact value.
    One(T),
    /// Must be one of this set.
    Set(BTreeSet<T>),
}

impl<T: PartialEq + Ord> FieldFilter<T> {
    fn matches(&self, value: Option<&T>) -> bool {
        match self {
            Self::Any => true,
            Self::One(want) => value == Some(want),
            Self::Set(set) => value.is_some_and(|v| set.contains(v)),
        }
    }
}

/// Full filter record accepted by [`apply`] (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Required diet compatibility.
    pub diet_type: FieldFilter<DietType>,
    /// Required glycemic index category.
    pub gi: FieldFilter<GiLevel>,
    /// Required region; `"All States"` always passes regardless of this
    /// field (spec.md §4.4).
    pub state: FieldFilter<String>,
    /// Maximum preparation time in minutes; documents with an unparseable
    /// `prepTime` pass (spec.md §4.4).
    pub max_prep_time: Option<u32>,
    /// Minimum protein per serving, grams.
    pub min_protein: Option<f64>,
    /// Maximum carbohydrates per serving, grams (net carbs when fiber is
    /// known, per [`rmge_core::models::DocumentMetadata::net_carbs`]).
    pub max_carbs: Option<f64>,
    /// Required budget tier label, matched case-insensitively against the
    /// document's `category` field.
    pub budget_level: FieldFilter<String>,
    /// Required meal slot.
    pub meal_type: FieldFilter<MealType>,
}

/// Cumulative statistics across calls to [`apply`] on one handle (spec.md
/// §4.4 "cumulative statistics: documents-in, documents-out, average filter
/// time").
#[derive(Debug, Default)]
pub struct FilterStats {
    docs_in: AtomicU64,
    docs_out: AtomicU64,
    total_nanos: AtomicU64,
    calls: AtomicU64,
}

/// Snapshot of [`FilterStats`] at a point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStatsSnapshot {
    /// Total documents seen across all calls.
    pub documents_in: u64,
    /// Total documents that passed the filter across all calls.
    pub documents_out: u64,
    /// Mean wall-clock time per call, in microseconds.
    pub average_filter_time_micros: f64,
}

impl FilterStats {
    /// Record one call's input/output counts and elapsed time.
    fn record(&self, docs_in: usize, docs_out: usize, elapsed: std::time::Duration) {
        self.docs_in.fetch_add(docs_in as u64, Ordering::Relaxed);
        self.docs_out.fetch_add(docs_out as u64, Ordering::Relaxed);
        self.total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FilterStatsSnapshot {
        let calls = self.calls.load(Ordering::Relaxed);
        let total_nanos = self.total_nanos.load(Ordering::Relaxed);
        FilterStatsSnapshot {
            documents_in: self.docs_in.load(Ordering::Relaxed),
            documents_out: self.docs_out.load(Ordering::Relaxed),
            average_filter_time_micros: if calls == 0 {
                0.0
            } else {
                (total_nanos as f64 / calls as f64) / 1000.0
            },
        }
    }
}

/// A filter handle wrapping [`FilterCriteria`] with [`FilterStats`]
/// tracking. Stateless aside from the counters; `apply` itself is pure.
#[derive(Debug, Default)]
pub struct MetadataFilter {
    stats: FilterStats,
}

impl MetadataFilter {
    /// New filter handle with zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `criteria` to `docs`, preserving input order (spec.md §4.4).
    #[must_use]
    pub fn apply(&self, docs: &[Document], criteria: &FilterCriteria) -> Vec<Document> {
        let start = Instant::now();
        let out: Vec<Document> = docs
            .iter()
            .filter(|doc| matches(doc, criteria))
            .cloned()
            .collect();
        self.stats.record(docs.len(), out.len(), start.elapsed());
        out
    }

    /// Current cumulative statistics.
    #[must_use]
    pub fn stats(&self) -> FilterStatsSnapshot {
        self.stats.snapshot()
    }
}

fn matches(doc: &Document, criteria: &FilterCriteria) -> bool {
    if !criteria.diet_type.matches(doc.metadata.diet_type.as_ref()) {
        return false;
    }
    if !criteria.gi.matches(doc.metadata.gi.as_ref()) {
        return false;
    }
    if !doc.is_all_states() {
        let state_lower = doc.metadata.state.as_ref().map(|s| s.to_lowercase());
        let state_filter = lowercase_field(&criteria.state);
        if !state_filter.matches(state_lower.as_ref()) {
            return false;
        }
    }
    if let Some(max_minutes) = criteria.max_prep_time {
        if let Some(actual) = doc.metadata.prep_time_minutes() {
            if actual > max_minutes {
                return false;
            }
        }
    }
    if let Some(min_protein) = criteria.min_protein {
        if doc.metadata.protein.is_some_and(|p| p < min_protein) {
            return false;
        }
    }
    if let Some(max_carbs) = criteria.max_carbs {
        if doc.metadata.net_carbs().is_some_and(|c| c > max_carbs) {
            return false;
        }
    }
    let category_lower = doc.metadata.category.as_ref().map(|s| s.to_lowercase());
    let budget_filter = lowercase_field(&criteria.budget_level);
    if !budget_filter.matches(category_lower.as_ref()) {
        return false;
    }
    if !criteria.meal_type.matches(doc.metadata.meal_type.as_ref()) {
        return false;
    }
    true
}

fn lowercase_field(filter: &FieldFilter<String>) -> FieldFilter<String> {
    match filter {
        FieldFilter::Any => FieldFilter::Any,
        FieldFilter::One(v) => FieldFilter::One(v.to_lowercase()),
        FieldFilter::Set(set) => FieldFilter::Set(set.iter().map(|v| v.to_lowercase()).collect()),
    }
}

/// Translate user preferences into a [`FilterCriteria`] (spec.md §4.4
/// "Preference-to-filter translation").
#[must_use]
pub fn translate_preferences(
    is_vegetarian: bool,
    is_keto: bool,
    preferred_state: Option<String>,
    budget_level: Option<String>,
    meal_type: Option<MealType>,
) -> FilterCriteria {
    let mut criteria = FilterCriteria::default();

    if is_vegetarian {
        criteria.diet_type = FieldFilter::Set(DietType::vegetarian_compatible().into_iter().collect());
    }
    if is_keto {
        criteria.gi = FieldFilter::One(GiLevel::Low);
        criteria.max_carbs = Some(20.0);
    }
    if let Some(state) = preferred_state {
        criteria.state = FieldFilter::One(state);
    }
    if let Some(level) = budget_level {
        criteria.budget_level = FieldFilter::One(level);
    }
    if let Some(mt) = meal_type {
        criteria.meal_type = FieldFilter::One(mt);
    }

    criteria
}
