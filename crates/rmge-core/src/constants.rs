// ABOUTME: Numeric defaults referenced throughout the engine, collected so tests and config
// ABOUTME: share one source of truth instead of re-deriving magic numbers per module

/// Cache sizing and retry defaults (spec.md §6 configuration table).
pub mod cache {
    /// Embedding LRU capacity (spec.md §4.1).
    pub const EMBEDDING_CACHE_MAX_ENTRIES: usize = 500;
    /// Embedding LRU TTL in seconds (1 hour, spec.md §4.1).
    pub const EMBEDDING_CACHE_TTL_SECS: u64 = 3_600;
    /// Query expansion cache capacity (spec.md §4.3).
    pub const EXPANSION_CACHE_MAX_ENTRIES: usize = 200;
    /// Query expansion cache TTL in seconds (spec.md §4.3).
    pub const EXPANSION_CACHE_TTL_SECS: u64 = 3_600;
    /// Document embedding batch size ceiling (spec.md §4.1).
    pub const EMBEDDING_BATCH_SIZE: usize = 100;
}

/// Retry/backoff defaults (spec.md §4.1, §6).
pub mod retry {
    /// Default maximum retry attempts after the first try.
    pub const MAX_RETRIES: u32 = 3;
    /// Default initial backoff delay for single-item calls, in milliseconds.
    pub const INITIAL_DELAY_MS: u64 = 1_000;
    /// Default initial backoff delay for batch calls, in milliseconds.
    pub const BATCH_INITIAL_DELAY_MS: u64 = 2_000;
    /// Default maximum backoff delay, in milliseconds.
    pub const MAX_DELAY_MS: u64 = 10_000;
    /// Default backoff multiplier.
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    /// Jitter fraction applied symmetrically around the computed delay.
    pub const JITTER_FRACTION: f64 = 0.25;
}

/// Retrieval pipeline defaults (spec.md §4.11, §6, §9).
pub mod retrieval {
    /// Base `k` for similarity search per query variant.
    pub const TOP_K: usize = 25;
    /// Floor for inclusion after dedup (spec.md §9 open question: recommended 0.3).
    pub const MIN_SCORE: f32 = 0.3;
    /// Cap of documents handed to the prompt builder.
    pub const MAX_PROMPT_DOCS: usize = 20;
    /// Maximum query variants produced by the expander.
    pub const MAX_QUERY_VARIATIONS: usize = 3;
    /// Bounded fan-out for concurrent embedding of query variants (spec.md §5).
    pub const MAX_CONCURRENT_EMBEDS: usize = 4;
}

/// Per-request timeouts, in milliseconds (spec.md §5).
pub mod timeouts {
    /// Embedding call budget including retries.
    pub const EMBEDDING_MS: u64 = 15_000;
    /// Similarity search budget.
    pub const SIMILARITY_SEARCH_MS: u64 = 10_000;
    /// LLM call budget.
    pub const LLM_MS: u64 = 60_000;
    /// Whole `generate_plan` request budget.
    pub const TOTAL_GENERATE_MS: u64 = 90_000;
}

/// Macro planning constants (spec.md §4.7).
pub mod macros {
    /// Mifflin-St Jeor weight coefficient.
    pub const MSJ_WEIGHT_COEF: f64 = 10.0;
    /// Mifflin-St Jeor height coefficient.
    pub const MSJ_HEIGHT_COEF: f64 = 6.25;
    /// Mifflin-St Jeor age coefficient.
    pub const MSJ_AGE_COEF: f64 = 5.0;
    /// Mifflin-St Jeor female constant (spec.md mandates the female form).
    pub const MSJ_FEMALE_CONSTANT: f64 = -161.0;
    /// Calorie adjustment applied for a "lose" weight goal.
    pub const LOSE_CALORIE_DELTA: f64 = -500.0;
    /// Calorie adjustment applied for a "gain" weight goal.
    pub const GAIN_CALORIE_DELTA: f64 = 500.0;
    /// Per-meal macro tolerance band (spec.md §4.7, §6 `macros.tolerancePct`).
    pub const PER_MEAL_TOLERANCE_PCT: f64 = 3.0;
    /// Daily carb reconciliation band, in grams (spec.md §4.7, §6 `macros.dailyCarbTolG`).
    pub const DAILY_CARB_TOLERANCE_G: f64 = 2.0;
    /// Daily protein/fat reconciliation band, in grams (spec.md §4.7, §6 `macros.dailyPFTolG`).
    pub const DAILY_PF_TOLERANCE_G: f64 = 5.0;
    /// Calorie-accounting tolerance for `4p + 4c + 9f` reconciliation, in kcal.
    pub const CALORIE_RECONCILE_TOLERANCE_KCAL: f64 = 2.0;
    /// Keto carb ceiling used to derive per-meal allowance, in grams/day.
    pub const KETO_DAILY_CARB_MAX_G: f64 = 20.0;
}

/// Quota plan limits (spec.md §4.10, §6).
pub mod quota {
    /// Lifetime generation count allowed on the free plan.
    pub const FREE_TOTAL_LIMIT: u32 = 1;
    /// Weekly generation count allowed on the pro plan.
    pub const PRO_WEEKLY_LIMIT: u32 = 3;
    /// Weekly generation count allowed on the max plan.
    pub const MAX_WEEKLY_LIMIT: u32 = 3;
}

/// Prompt budget (spec.md §4.8).
pub mod prompt {
    /// Approximate characters per token used for the coarse token estimator.
    pub const CHARS_PER_TOKEN: usize = 4;
    /// Soft token budget for the whole prompt.
    pub const MAX_ESTIMATED_TOKENS: usize = 50_000;
    /// Upper bound on template excerpts included in the prompt.
    pub const MAX_TEMPLATE_EXCERPTS: usize = 20;
}
