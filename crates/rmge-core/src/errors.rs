// ABOUTME: Centralized error type returned by every public RMGE operation
// ABOUTME: Mirrors the teacher's AppError/ErrorCode split: typed variants plus a caller-safe message

use std::fmt;
use thiserror::Error;

/// Errors returned by the core across the whole request lifecycle (spec.md §7).
///
/// Adapter crates (`rmge-providers`) define their own narrow error enums and
/// convert into this type at the orchestrator boundary, the same way the
/// teacher's per-provider `ProviderError` converts into the top-level
/// `AppError`.
#[derive(Debug, Error, Clone)]
pub enum RmgeError {
    /// Invalid request shape or values; non-retryable by the caller.
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable, caller-safe description.
        message: String,
    },

    /// Usage quota exhausted for the plan/period.
    #[error("quota exceeded: plan={plan} count={current_count} limit={limit} ({reason})")]
    QuotaExceeded {
        /// Plan the user is currently on.
        plan: String,
        /// Count observed at decision time.
        current_count: u32,
        /// Configured limit for that plan/period.
        limit: u32,
        /// Machine-readable reason string (e.g. `"free_total_exhausted"`).
        reason: String,
    },

    /// Embedding service call failed after retries, or rejected the input.
    #[error("embedding error: {message}")]
    Embedding {
        /// Description of the failure.
        message: String,
        /// Whether the caller may usefully retry later.
        retryable: bool,
    },

    /// Vector index call failed after retries.
    #[error("index error: {message}")]
    Index {
        /// Description of the failure.
        message: String,
        /// Whether the caller may usefully retry later.
        retryable: bool,
    },

    /// LLM call failed after retries.
    #[error("llm error: {message}")]
    Llm {
        /// Description of the failure.
        message: String,
        /// Whether the caller may usefully retry later.
        retryable: bool,
    },

    /// LLM output could not be interpreted after the bounded repair pass.
    ///
    /// Per spec.md §7 this variant is always absorbed internally by the
    /// orchestrator (it falls back to template assembly) and is only ever
    /// surfaced to a caller wrapped inside [`RmgeError::GenerationFailed`].
    #[error("parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The request's deadline was exceeded, or the caller cancelled it.
    #[error("cancelled: {reason}")]
    Cancelled {
        /// Which stage observed the cancellation.
        reason: String,
    },

    /// Validation failed after repair and fallback; indicates inconsistent
    /// templates rather than a transient failure.
    #[error("generation failed: {message}")]
    GenerationFailed {
        /// Description of why even the fallback plan could not be produced.
        message: String,
    },
}

impl RmgeError {
    /// Construct a [`RmgeError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Construct a [`RmgeError::QuotaExceeded`].
    #[must_use]
    pub fn quota_exceeded(
        plan: impl Into<String>,
        current_count: u32,
        limit: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::QuotaExceeded {
            plan: plan.into(),
            current_count,
            limit,
            reason: reason.into(),
        }
    }

    /// Construct a [`RmgeError::Cancelled`].
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Whether retrying the whole request later is potentially useful.
    ///
    /// Used by the orchestrator to decide what to log at ERROR vs WARN, and
    /// by callers deciding whether to surface a retry affordance.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding { retryable, .. }
            | Self::Index { retryable, .. }
            | Self::Llm { retryable, .. } => *retryable,
            Self::Validation { .. }
            | Self::QuotaExceeded { .. }
            | Self::Parse { .. }
            | Self::Cancelled { .. }
            | Self::GenerationFailed { .. } => false,
        }
    }

    /// Machine-readable error code, stable across versions.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Embedding { .. } => "embedding_error",
            Self::Index { .. } => "index_error",
            Self::Llm { .. } => "llm_error",
            Self::Parse { .. } => "parse_error",
            Self::Cancelled { .. } => "cancelled",
            Self::GenerationFailed { .. } => "generation_failed",
        }
    }

    /// A message safe to display to an end user: no stack traces, no
    /// internal identifiers beyond what the variant already carries.
    #[must_use]
    pub fn sanitized_message(&self) -> String {
        self.to_string()
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RmgeError>;

impl fmt::Display for RetryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => write!(f, "retryable"),
            Self::NonRetryable => write!(f, "non_retryable"),
        }
    }
}

/// Classification used by adapters to decide whether `Retry` should re-attempt
/// a failed call (spec.md §4.1/§4.9: "network/5xx/429 → retry;
/// invalid-credential/4xx-non-429 → non-retryable").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient failure; the caller's `Retry` primitive should re-attempt.
    Retryable,
    /// Permanent failure; retrying would not help.
    NonRetryable,
}
