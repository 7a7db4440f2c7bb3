// ABOUTME: Hybrid re-ranking: per-feature scores normalized to [0,1], combined under intent-adjusted weights
// ABOUTME: Builder-style weight composition modeled on the pack's hybrid-search fusion pattern
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use rmge_core::models::{GiLevel, ScoredDoc};

/// Weight vector over the six re-rank features (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    /// Weight on the semantic similarity feature.
    pub semantic: f64,
    /// Weight on the protein feature.
    pub protein: f64,
    /// Weight on the carbs feature.
    pub carbs: f64,
    /// Weight on the glycemic index feature.
    pub gi: f64,
    /// Weight on the budget feature.
    pub budget: f64,
    /// Weight on the prep-time feature.
    pub time: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            semantic: 0.40,
            protein: 0.15,
            carbs: 0.10,
            gi: 0.20,
            budget: 0.10,
            time: 0.05,
        }
    }
}

impl Weights {
    /// Sum of all six weights.
    fn sum(&self) -> f64 {
        self.semantic + self.protein + self.carbs + self.gi + self.budget + self.time
    }

    /// Scale all weights so they sum to 1 (spec.md §8 property 4).
    #[must_use]
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return Self::default().normalized();
        }
        Self {
            semantic: self.semantic / total,
            protein: self.protein / total,
            carbs: self.carbs / total,
            gi: self.gi / total,
            budget: self.budget / total,
            time: self.time / total,
        }
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Detect the first matching intent signal in `query` (lowercased) and
/// return the adjusted weight vector; `is_keto` composes additively on top
/// regardless of which intent matched (spec.md §4.6).
#[must_use]
pub fn weights_for_intent(query: &str, is_keto: bool) -> Weights {
    let lower = query.to_lowercase();
    let mut weights = Weights::default();

    if lower.contains("high protein") || lower.contains("protein-rich") {
        weights.protein = 0.30;
        weights.semantic = 0.30;
    } else if contains_word(&lower, "quick") || contains_word(&lower, "fast") || contains_word(&lower, "easy") {
        weights.time = 0.20;
        weights.semantic = 0.30;
    } else if lower.contains("budget")
        || lower.contains("cheap")
        || lower.contains("affordable")
        || lower.contains("low cost")
    {
        weights.budget = 0.25;
        weights.semantic = 0.30;
    } else if lower.contains("low gi") || lower.contains("low glycemic") || lower.contains("blood sugar") {
        weights.gi = 0.30;
        weights.semantic = 0.30;
    } else if lower.contains("protein") {
        weights.protein = 0.25;
        weights.semantic = 0.35;
    }

    if is_keto {
        weights.carbs = 0.25;
        weights.protein = 0.20;
        weights.semantic = 0.25;
    }

    weights.normalized()
}

/// Feature inputs needed to score one document, independent of the document
/// type so unit tests can build them directly (spec.md §4.6).
#[derive(Debug, Clone, Copy)]
pub struct FeatureInputs {
    /// Cosine similarity score, already in `[0, 1]`.
    pub semantic: f32,
    /// Protein grams for the document.
    pub protein_g: Option<f64>,
    /// An upper bound for protein normalization (e.g. the per-meal protein
    /// target times some multiple).
    pub protein_upper_bound: f64,
    /// Protein target the document should meet for the bonus.
    pub protein_target: f64,
    /// Net carbs for the document.
    pub carbs_g: Option<f64>,
    /// Carb target (per-meal) for normal mode.
    pub carbs_target: f64,
    /// Keto daily carb ceiling, used in keto mode.
    pub keto_carbs_max: f64,
    /// Whether keto scoring applies to the carb feature.
    pub is_keto: bool,
    /// Document's glycemic index category.
    pub gi: Option<GiLevel>,
    /// Document's maximum budget, rupees.
    pub budget_max: Option<f64>,
    /// User's budget per day/meal, rupees.
    pub user_budget: f64,
    /// Document's preparation time, minutes.
    pub prep_time_minutes: Option<u32>,
    /// Maximum acceptable preparation time, minutes.
    pub max_time_minutes: f64,
}

/// Per-feature scores for one document, each normalized to `[0, 1]`
/// (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScores {
    /// Semantic similarity feature.
    pub semantic: f64,
    /// Protein feature.
    pub protein: f64,
    /// Carbs feature.
    pub carbs: f64,
    /// Glycemic index feature.
    pub gi: f64,
    /// Budget feature.
    pub budget: f64,
    /// Prep-time feature.
    pub time: f64,
}

/// Compute per-feature scores for one document (spec.md §4.6).
#[must_use]
pub fn score_features(inputs: &FeatureInputs) -> FeatureScores {
    let semantic = f64::from(inputs.semantic).clamp(0.0, 1.0);

    let protein = match inputs.protein_g {
        Some(p) if inputs.protein_upper_bound > 0.0 => {
            let ramp = (p / inputs.protein_upper_bound).clamp(0.0, 1.0);
            let bonus = if p >= inputs.protein_target { 0.2 } else { 0.0 };
            (ramp + bonus).min(1.0)
        }
        _ => 0.0,
    };

    let carbs = match inputs.carbs_g {
        Some(c) if inputs.is_keto => (1.0 - c / (inputs.keto_carbs_max * 3.0)).max(0.0),
        Some(c) if inputs.carbs_target > 0.0 => {
            (1.0 - (c - inputs.carbs_target).abs() / inputs.carbs_target).max(0.0)
        }
        _ => 0.0,
    };

    let gi = match inputs.gi {
        Some(GiLevel::Low) => 1.0,
        Some(GiLevel::Medium) => 0.7,
        Some(GiLevel::High) => 0.3,
        None => 0.5,
    };

    let budget = match inputs.budget_max {
        Some(max) if max <= inputs.user_budget => 1.0,
        Some(max) if inputs.user_budget > 0.0 => {
            let overage = (max - inputs.user_budget) / inputs.user_budget;
            (1.0 - overage).max(0.0)
        }
        _ => 1.0,
    };

    let time = match inputs.prep_time_minutes {
        Some(minutes) if inputs.max_time_minutes > 0.0 => {
            let ratio = f64::from(minutes) / inputs.max_time_minutes;
            if ratio <= 1.0 {
                1.0 - 0.3 * ratio
            } else {
                (0.7 - (ratio - 1.0)).max(0.0)
            }
        }
        _ => 0.7,
    };

    FeatureScores {
        semantic,
        protein,
        carbs,
        gi,
        budget,
        time,
    }
}

impl FeatureScores {
    /// Weighted sum under `weights` (assumed already normalized).
    #[must_use]
    pub fn combined(&self, weights: &Weights) -> f64 {
        self.semantic * weights.semantic
            + self.protein * weights.protein
            + self.carbs * weights.carbs
            + self.gi * weights.gi
            + self.budget * weights.budget
            + self.time * weights.time
    }
}

/// Per-item debugging output recorded alongside the re-ranked list (spec.md
/// §4.6: "original vs re-rank score, contributing feature scores, chosen
/// weights").
#[derive(Debug, Clone)]
pub struct RerankTrace {
    /// Document id this trace belongs to.
    pub document_id: String,
    /// Semantic score before re-ranking.
    pub original_score: f32,
    /// Combined score after re-ranking.
    pub rerank_score: f32,
    /// Per-feature scores that produced the combined score.
    pub feature_scores: FeatureScores,
}

/// Re-rank `docs` using `weights`, returning the sorted list and a parallel
/// trace for observability (spec.md §4.6, §4.11 step 7).
#[must_use]
pub fn rerank(
    mut docs: Vec<ScoredDoc>,
    feature_inputs: impl Fn(&ScoredDoc) -> FeatureInputs,
    weights: &Weights,
) -> (Vec<ScoredDoc>, Vec<RerankTrace>) {
    let mut traces = Vec::with_capacity(docs.len());

    for doc in &mut docs {
        let inputs = feature_inputs(doc);
        let features = score_features(&inputs);
        let combined = features.combined(weights) as f32;

        traces.push(RerankTrace {
            document_id: doc.document.id.clone(),
            original_score: doc.semantic_score,
            rerank_score: combined,
            feature_scores: features,
        });

        doc.rerank_score = Some(combined);
        doc.feature_scores = [
            ("semantic".to_string(), features.semantic as f32),
            ("protein".to_string(), features.protein as f32),
            ("carbs".to_string(), features.carbs as f32),
            ("gi".to_string(), features.gi as f32),
            ("budget".to_string(), features.budget as f32),
            ("time".to_string(), features.time as f32),
        ]
        .into_iter()
        .collect();
    }

    docs.sort_by(|a, b| b.effective_score().total_cmp(&a.effective_score()));
    (docs, traces)
}
