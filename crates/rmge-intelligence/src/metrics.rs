// ABOUTME: In-process percentile tracker for per-stage generation durations
// ABOUTME: Atomic counters per outcome, percentile state updated under a short-held lock (spec.md §5)
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Named stage a duration sample belongs to (spec.md §4.11, §9 "Metrics").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Query expansion.
    Expand,
    /// Embedding calls.
    Embed,
    /// Vector index retrieval.
    Retrieve,
    /// Filter/dedup/re-rank.
    Rank,
    /// LLM generation.
    Generate,
    /// Output validation/repair.
    Validate,
    /// Whole-request wall clock.
    Total,
}

/// Generation outcome, tracked as a simple atomic counter (spec.md §9
/// "Metrics counters use simple atomic increments").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Plan returned from the LLM, validated without repair.
    LlmGenerated,
    /// Plan returned from the LLM after a successful repair round.
    LlmRepaired,
    /// Plan assembled from the template fallback.
    TemplateFallback,
    /// Request denied by QuotaGate.
    QuotaDenied,
    /// Request failed validation after repair and fallback.
    GenerationFailed,
    /// Request cancelled before completion.
    Cancelled,
}

/// Bounded sample buffer for one stage; holds at most `capacity` of the most
/// recent samples (a short-held lock guards mutation, per spec.md §5).
struct SampleWindow {
    samples: Vec<f64>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, millis: f64) {
        if self.samples.len() == self.capacity {
            self.samples.remove(0);
        }
        self.samples.push(millis);
    }

    fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).copied()
    }
}

/// Percentile snapshot for one stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagePercentiles {
    /// Minimum observed duration, milliseconds.
    pub min: f64,
    /// 50th percentile, milliseconds.
    pub p50: f64,
    /// 95th percentile, milliseconds.
    pub p95: f64,
    /// 99th percentile, milliseconds.
    pub p99: f64,
    /// Maximum observed duration, milliseconds.
    pub max: f64,
    /// Number of samples contributing to this window.
    pub sample_count: usize,
}

const DEFAULT_WINDOW_CAPACITY: usize = 1000;

/// In-process metrics tracker for the orchestrator: per-stage duration
/// percentiles plus per-outcome atomic counters (spec.md §4.11 step 12, §9).
pub struct MetricsTracker {
    windows: Mutex<BTreeMap<Stage, SampleWindow>>,
    outcome_counts: Mutex<BTreeMap<&'static str, u64>>,
    total_requests: AtomicU64,
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl MetricsTracker {
    /// New tracker with `window_capacity` samples retained per stage.
    #[must_use]
    pub fn new(window_capacity: usize) -> Self {
        let mut windows = BTreeMap::new();
        for stage in [
            Stage::Expand,
            Stage::Embed,
            Stage::Retrieve,
            Stage::Rank,
            Stage::Generate,
            Stage::Validate,
            Stage::Total,
        ] {
            windows.insert(stage, SampleWindow::new(window_capacity));
        }
        Self {
            windows: Mutex::new(windows),
            outcome_counts: Mutex::new(BTreeMap::new()),
            total_requests: AtomicU64::new(0),
        }
    }

    /// Record one stage's duration (spec.md §5: "percentile state is
    /// updated under a short-held lock").
    pub fn record_stage(&self, stage: Stage, duration: Duration) {
        let mut windows = self.windows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(window) = windows.get_mut(&stage) {
            window.push(duration.as_secs_f64() * 1000.0);
        }
    }

    /// Record one request's terminal outcome (spec.md §7: "Metrics are
    /// recorded in every outcome").
    pub fn record_outcome(&self, outcome: Outcome) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let key = outcome_key(outcome);
        let mut counts = self
            .outcome_counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *counts.entry(key).or_insert(0) += 1;
    }

    /// Percentile snapshot for one stage.
    #[must_use]
    pub fn stage_percentiles(&self, stage: Stage) -> StagePercentiles {
        let windows = self.windows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(window) = windows.get(&stage) else {
            return StagePercentiles::default();
        };
        StagePercentiles {
            min: window.percentile(0.0).unwrap_or(0.0),
            p50: window.percentile(0.50).unwrap_or(0.0),
            p95: window.percentile(0.95).unwrap_or(0.0),
            p99: window.percentile(0.99).unwrap_or(0.0),
            max: window.percentile(1.0).unwrap_or(0.0),
            sample_count: window.samples.len(),
        }
    }

    /// Total requests observed across all outcomes.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Count for one outcome kind.
    #[must_use]
    pub fn outcome_count(&self, outcome: Outcome) -> u64 {
        let counts = self
            .outcome_counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *counts.get(outcome_key(outcome)).unwrap_or(&0)
    }
}

const fn outcome_key(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::LlmGenerated => "llm_generated",
        Outcome::LlmRepaired => "llm_repaired",
        Outcome::TemplateFallback => "template_fallback",
        Outcome::QuotaDenied => "quota_denied",
        Outcome::GenerationFailed => "generation_failed",
        Outcome::Cancelled => "cancelled",
    }
}
