// ABOUTME: Plain environment-variable configuration, no toml/config crate (teacher's convention)
// ABOUTME: Every row of spec.md §6's configuration table, plus the timezone open question (§9)
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::env;
use std::time::Duration;

/// Retry policy knobs shared by the three adapter crates (spec.md §6
/// `retry.*`).
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff delay, milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff ceiling, milliseconds.
    pub max_delay_ms: u64,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: rmge_core::constants::retry::MAX_RETRIES,
            initial_delay_ms: rmge_core::constants::retry::INITIAL_DELAY_MS,
            max_delay_ms: rmge_core::constants::retry::MAX_DELAY_MS,
            backoff_multiplier: rmge_core::constants::retry::BACKOFF_MULTIPLIER,
        }
    }
}

/// Embedding-related configuration (spec.md §6 `embedding.*`).
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model identifier, passed through to the provider.
    pub model: String,
    /// LRU entry cap.
    pub cache_size: usize,
    /// LRU entry TTL.
    pub cache_ttl: Duration,
    /// Document batching ceiling.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_owned(),
            cache_size: rmge_core::constants::cache::EMBEDDING_CACHE_MAX_ENTRIES,
            cache_ttl: Duration::from_secs(rmge_core::constants::cache::EMBEDDING_CACHE_TTL_SECS),
            batch_size: rmge_core::constants::cache::EMBEDDING_BATCH_SIZE,
        }
    }
}

/// Retrieval pipeline configuration (spec.md §6 `retrieval.*`).
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    /// Base `k` for similarity search per query variant.
    pub top_k: usize,
    /// Floor for inclusion after dedup; a value of `0.0` is accepted for
    /// diagnostics but must never be the effective default in production
    /// (spec.md §9 open question).
    pub min_score: f32,
    /// Cap of documents handed to the prompt builder.
    pub max_docs: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: rmge_core::constants::retrieval::TOP_K,
            min_score: rmge_core::constants::retrieval::MIN_SCORE,
            max_docs: rmge_core::constants::retrieval::MAX_PROMPT_DOCS,
        }
    }
}

/// LLM generation configuration (spec.md §6 `llm.*`).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// Quota plan limits (spec.md §6 `quota.*`).
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Lifetime generation count allowed on the free plan.
    pub free_total: u32,
    /// Weekly generation count allowed on the pro plan.
    pub pro_weekly: u32,
    /// Weekly generation count allowed on the max plan.
    pub max_weekly: u32,
    /// User id that bypasses all limits (spec.md §4.10 "Test-account
    /// identifier bypasses limits").
    pub test_user_id: Option<String>,
    /// Timezone the "last Monday at local midnight" boundary is computed in
    /// (spec.md §9 open question: "specify the timezone explicitly in
    /// configuration to avoid off-by-one resets in distributed
    /// deployments"). An IANA name, or `"UTC"`.
    pub reset_timezone: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_total: rmge_core::constants::quota::FREE_TOTAL_LIMIT,
            pro_weekly: rmge_core::constants::quota::PRO_WEEKLY_LIMIT,
            max_weekly: rmge_core::constants::quota::MAX_WEEKLY_LIMIT,
            test_user_id: None,
            reset_timezone: "UTC".to_owned(),
        }
    }
}

/// Macro validation bands (spec.md §6 `macros.*`).
#[derive(Debug, Clone, Copy)]
pub struct MacroToleranceConfig {
    /// Per-meal tolerance, percent of target.
    pub tolerance_pct: f64,
    /// Daily carb reconciliation band, grams.
    pub daily_carb_tol_g: f64,
    /// Daily protein/fat reconciliation band, grams.
    pub daily_pf_tol_g: f64,
}

impl Default for MacroToleranceConfig {
    fn default() -> Self {
        Self {
            tolerance_pct: rmge_core::constants::macros::PER_MEAL_TOLERANCE_PCT,
            daily_carb_tol_g: rmge_core::constants::macros::DAILY_CARB_TOLERANCE_G,
            daily_pf_tol_g: rmge_core::constants::macros::DAILY_PF_TOLERANCE_G,
        }
    }
}

/// Top-level engine configuration, assembled once at process start and
/// shared read-only across requests (spec.md §6, §9 "Global state").
#[derive(Debug, Clone, Default)]
pub struct RmgeConfig {
    /// Embedding adapter configuration.
    pub embedding: EmbeddingConfig,
    /// Retrieval pipeline configuration.
    pub retrieval: RetrievalConfig,
    /// Retry policy shared by all three adapters.
    pub retry: RetryConfig,
    /// LLM generation configuration.
    pub llm: LlmConfig,
    /// Quota plan limits.
    pub quota: QuotaConfig,
    /// Macro validation bands.
    pub macros: MacroToleranceConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

impl RmgeConfig {
    /// Build configuration from environment variables, falling back to
    /// spec.md §6's documented defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            embedding: EmbeddingConfig {
                model: env_string_or("RMGE_EMBEDDING_MODEL", &defaults.embedding.model),
                cache_size: env_or("RMGE_EMBEDDING_CACHE_SIZE", defaults.embedding.cache_size),
                cache_ttl: Duration::from_secs(env_or(
                    "RMGE_EMBEDDING_CACHE_TTL_SECONDS",
                    defaults.embedding.cache_ttl.as_secs(),
                )),
                batch_size: env_or("RMGE_EMBEDDING_BATCH_SIZE", defaults.embedding.batch_size),
            },
            retrieval: RetrievalConfig {
                top_k: env_or("RMGE_RETRIEVAL_TOP_K", defaults.retrieval.top_k),
                min_score: env_or("RMGE_RETRIEVAL_MIN_SCORE", defaults.retrieval.min_score),
                max_docs: env_or("RMGE_RETRIEVAL_MAX_DOCS", defaults.retrieval.max_docs),
            },
            retry: RetryConfig {
                max_retries: env_or("RMGE_RETRY_MAX_RETRIES", defaults.retry.max_retries),
                initial_delay_ms: env_or(
                    "RMGE_RETRY_INITIAL_DELAY_MS",
                    defaults.retry.initial_delay_ms,
                ),
                max_delay_ms: env_or("RMGE_RETRY_MAX_DELAY_MS", defaults.retry.max_delay_ms),
                backoff_multiplier: env_or(
                    "RMGE_RETRY_BACKOFF_MULTIPLIER",
                    defaults.retry.backoff_multiplier,
                ),
            },
            llm: LlmConfig {
                model: env_string_or("RMGE_LLM_MODEL", &defaults.llm.model),
                temperature: env_or("RMGE_LLM_TEMPERATURE", defaults.llm.temperature),
                max_tokens: env_or("RMGE_LLM_MAX_TOKENS", defaults.llm.max_tokens),
            },
            quota: QuotaConfig {
                free_total: env_or("RMGE_QUOTA_FREE_TOTAL", defaults.quota.free_total),
                pro_weekly: env_or("RMGE_QUOTA_PRO_WEEKLY", defaults.quota.pro_weekly),
                max_weekly: env_or("RMGE_QUOTA_MAX_WEEKLY", defaults.quota.max_weekly),
                test_user_id: env::var("RMGE_QUOTA_TEST_USER_ID").ok(),
                reset_timezone: env_string_or(
                    "RMGE_QUOTA_RESET_TIMEZONE",
                    &defaults.quota.reset_timezone,
                ),
            },
            macros: MacroToleranceConfig {
                tolerance_pct: env_or(
                    "RMGE_MACROS_TOLERANCE_PCT",
                    defaults.macros.tolerance_pct,
                ),
                daily_carb_tol_g: env_or(
                    "RMGE_MACROS_DAILY_CARB_TOL_G",
                    defaults.macros.daily_carb_tol_g,
                ),
                daily_pf_tol_g: env_or(
                    "RMGE_MACROS_DAILY_PF_TOL_G",
                    defaults.macros.daily_pf_tol_g,
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = RmgeConfig::default();
        assert_eq!(config.embedding.cache_size, 500);
        assert_eq!(config.embedding.cache_ttl, Duration::from_secs(3_600));
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.retrieval.top_k, 25);
        assert!((config.retrieval.min_score - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.max_docs, 20);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.quota.free_total, 1);
        assert_eq!(config.quota.pro_weekly, 3);
        assert_eq!(config.quota.max_weekly, 3);
        assert!((config.macros.tolerance_pct - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        let config = RmgeConfig::from_env();
        assert_eq!(config.embedding.batch_size, RmgeConfig::default().embedding.batch_size);
    }
}
