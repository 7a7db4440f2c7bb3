// ABOUTME: Exponential backoff with jitter and a cooperative cancellation token
// ABOUTME: Shared by the embedding, vector index, and LLM adapters (spec.md §4.1, §5, §9)

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use rmge_core::RetryClass;

/// Backoff schedule for an outbound call (spec.md §4.1, §6).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, milliseconds.
    pub initial_delay_ms: u64,
    /// Ceiling the delay is clamped to, milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// Symmetric jitter fraction applied around the computed delay
    /// (spec.md §9: "Preserve the ±25% jitter ... without it, synchronized
    /// retries ... will thundering-herd the service").
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: rmge_core::constants::retry::MAX_RETRIES,
            initial_delay_ms: rmge_core::constants::retry::INITIAL_DELAY_MS,
            max_delay_ms: rmge_core::constants::retry::MAX_DELAY_MS,
            backoff_multiplier: rmge_core::constants::retry::BACKOFF_MULTIPLIER,
            jitter_fraction: rmge_core::constants::retry::JITTER_FRACTION,
        }
    }
}

impl RetryPolicy {
    /// Policy for batched document-embedding calls (spec.md §4.1: "2 s for
    /// batches").
    #[must_use]
    pub fn for_batches() -> Self {
        Self {
            initial_delay_ms: rmge_core::constants::retry::BATCH_INITIAL_DELAY_MS,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt` (1-based retry count), before jitter,
    /// clamped to `max_delay_ms`. Monotonically non-decreasing (spec.md §8
    /// property 6).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        let clamped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(clamped as u64)
    }

    /// `base_delay` with ±`jitter_fraction` applied.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let jitter_span = base * self.jitter_fraction;
        let offset = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_millis((base + offset).max(0.0) as u64)
    }
}

/// Cooperative cancellation signal threaded through a request's suspension
/// points (spec.md §5, §9). Cheap to clone; all clones observe the same
/// flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of a single attempt, used to decide whether `retry` should
/// re-attempt (spec.md §4.1: "network/5xx/429 → retry;
/// invalid-credential/4xx-non-429 → non-retryable").
pub trait Retryable {
    /// Classify this error as retryable or not.
    fn retry_class(&self) -> RetryClass;
}

/// Run `operation` under `policy`, retrying while the error classifies as
/// [`RetryClass::Retryable`], up to `policy.max_retries` additional attempts
/// (spec.md §8 property 6: never more than `max_retries + 1` attempts
/// total). Checks `cancel` before each attempt and before each sleep;
/// cancellation abandons the in-flight attempt without logging it as an
/// error (spec.md §9).
///
/// # Errors
///
/// Returns the last error from `operation` once retries are exhausted, or
/// [`CancelledDuringRetry`] if `cancel` fires first.
pub async fn retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryOutcome<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryOutcome::Cancelled);
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.retry_class() == RetryClass::NonRetryable || attempt >= policy.max_retries {
                    return Err(RetryOutcome::Failed(err));
                }
                attempt += 1;
                let delay = policy.jittered_delay(attempt);
                warn!(attempt, ?delay, "retrying after transient failure");

                if cancel.is_cancelled() {
                    return Err(RetryOutcome::Cancelled);
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Result of a retried operation that did not succeed.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// Retries were exhausted (or the error was non-retryable); carries the
    /// last observed error.
    Failed(E),
    /// Cancellation was observed before or during a retry wait.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct FakeError(RetryClass);

    impl Retryable for FakeError {
        fn retry_class(&self) -> RetryClass {
            self.0
        }
    }

    #[test]
    fn base_delay_is_monotonically_non_decreasing_up_to_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.0,
        };
        let mut last = Duration::from_millis(0);
        for attempt in 1..=6 {
            let d = policy.base_delay(attempt);
            assert!(d >= last);
            assert!(d.as_millis() as u64 <= policy.max_delay_ms);
            last = d;
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result: Result<u32, RetryOutcome<FakeError>> = retry(&policy, &cancel, || {
            calls += 1;
            async { Ok::<u32, FakeError>(42) }
        })
        .await;
        assert_eq!(calls, 1);
        assert!(matches!(result, Ok(42)));
    }

    #[tokio::test]
    async fn never_exceeds_max_retries_plus_one_attempts() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
            jitter_fraction: 0.0,
        };
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result: Result<u32, RetryOutcome<FakeError>> = retry(&policy, &cancel, || {
            calls += 1;
            async { Err::<u32, FakeError>(FakeError(RetryClass::Retryable)) }
        })
        .await;
        assert_eq!(calls, 4); // 1 initial + 3 retries
        assert!(matches!(result, Err(RetryOutcome::Failed(_))));
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result: Result<u32, RetryOutcome<FakeError>> = retry(&policy, &cancel, || {
            calls += 1;
            async { Err::<u32, FakeError>(FakeError(RetryClass::NonRetryable)) }
        })
        .await;
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(RetryOutcome::Failed(_))));
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;
        let result: Result<u32, RetryOutcome<FakeError>> = retry(&policy, &cancel, || {
            calls += 1;
            async { Ok::<u32, FakeError>(1) }
        })
        .await;
        assert_eq!(calls, 0);
        assert!(matches!(result, Err(RetryOutcome::Cancelled)));
    }
}
