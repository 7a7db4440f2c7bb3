// ABOUTME: Per-user quota check/increment: weekly-reset boundary, test-account bypass, cancel downgrade
// ABOUTME: Increment acquires a per-user lock (spec.md §5); the denial check reads non-pessimistically
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, TimeZone, Utc};
use rmge_core::models::{Plan, QuotaState, SubscriptionStatus};

use rmge_core::RmgeError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::QuotaConfig;

/// The small repository interface the core reads/writes quota state through
/// (spec.md §6 "Persistence boundary"): `getUser`, `incrementMealCounter`,
/// `updateUser`.
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// Fetch the current quota record for `user_id`.
    async fn get_quota_state(&self, user_id: &str) -> Result<QuotaState, RmgeError>;

    /// Persist `state` for `user_id` (used after a weekly reset or plan
    /// downgrade, and after a successful increment).
    async fn save_quota_state(&self, user_id: &str, state: &QuotaState) -> Result<(), RmgeError>;
}

/// Outcome of a quota check, including the reset/downgrade bookkeeping that
/// must be persisted regardless of allow/deny (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Request may proceed.
    Allowed,
    /// Request must be denied; the caller should surface `RmgeError::QuotaExceeded`.
    Denied,
}

/// Compute the start of the current week (Monday 00:00) in the configured
/// timezone, expressed back in UTC (spec.md §9 open question: "specify the
/// timezone explicitly in configuration"). Only `"UTC"` and `"local"` are
/// recognized; anything else falls back to UTC with a warning, since this
/// build carries no IANA timezone database dependency.
fn last_monday_midnight(now: DateTime<Utc>, tz: &str) -> DateTime<Utc> {
    if tz.eq_ignore_ascii_case("local") {
        let local_now = now.with_timezone(&Local);
        let days_since_monday = local_now.weekday().num_days_from_monday();
        let local_midnight = (local_now - ChronoDuration::days(i64::from(days_since_monday)))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        return Local
            .from_local_datetime(&local_midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
    }
    if !tz.eq_ignore_ascii_case("utc") {
        warn!(timezone = tz, "unrecognized reset timezone, falling back to UTC");
    }
    let days_since_monday = now.weekday().num_days_from_monday();
    let midnight = (now - ChronoDuration::days(i64::from(days_since_monday)))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

/// Reads and increments per-user quota records (spec.md §4.10, §5).
pub struct QuotaGate<R: QuotaRepository> {
    repository: Arc<R>,
    config: QuotaConfig,
    locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl<R: QuotaRepository> QuotaGate<R> {
    /// Build a gate around `repository` using `config`'s plan limits and
    /// reset timezone.
    #[must_use]
    pub fn new(repository: Arc<R>, config: QuotaConfig) -> Self {
        Self {
            repository,
            config,
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(user_id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Apply the weekly-reset and cancelled-subscription-downgrade
    /// bookkeeping to `state`, returning whether it changed (spec.md §4.10).
    fn reconcile(&self, state: &mut QuotaState, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        if state.status == SubscriptionStatus::Canceled {
            if let Some(end_date) = state.subscription_end_date {
                if now > end_date {
                    state.plan = Plan::Expired;
                    state.status = SubscriptionStatus::Expired;
                    changed = true;
                }
            }
        }

        let monday = last_monday_midnight(now, &self.config.reset_timezone);
        if state.last_reset_date < monday {
            state.weekly_count = 0;
            state.last_reset_date = monday;
            changed = true;
        }

        changed
    }

    /// Check whether `user_id` may generate a plan right now. Test-account
    /// identifiers always return [`QuotaDecision::Allowed`] (spec.md §4.10).
    ///
    /// Reads the latest snapshot non-pessimistically: over-counting under
    /// concurrent requests is worse than an occasional extra allow (spec.md §5).
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    #[instrument(skip(self))]
    pub async fn check(&self, user_id: &str, now: DateTime<Utc>) -> Result<QuotaDecision, RmgeError> {
        self.check_state(user_id, now).await.map(|(decision, _)| decision)
    }

    /// As [`Self::check`], but also returns the reconciled state so callers
    /// can build a denial error without a second repository read.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn check_state(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(QuotaDecision, QuotaState), RmgeError> {
        if self.config.test_user_id.as_deref() == Some(user_id) {
            debug!("test account bypasses quota");
            let state = self.repository.get_quota_state(user_id).await?;
            return Ok((QuotaDecision::Allowed, state));
        }

        let mut state = self.repository.get_quota_state(user_id).await?;
        if self.reconcile(&mut state, now) {
            self.repository.save_quota_state(user_id, &state).await?;
        }

        let denied = match state.plan {
            Plan::Free | Plan::Expired => state.total_count >= self.config.free_total,
            Plan::Pro => state.weekly_count >= self.config.pro_weekly,
            Plan::Max => state.weekly_count >= self.config.max_weekly,
        };

        let decision = if denied { QuotaDecision::Denied } else { QuotaDecision::Allowed };
        Ok((decision, state))
    }

    /// Increment `user_id`'s counters after a successful, fully validated
    /// generation (spec.md §4.10: "exactly once ... never on cache or
    /// validation failures"). Serializes concurrent increments for the same
    /// user behind a per-user lock (spec.md §5).
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    #[instrument(skip(self))]
    pub async fn increment(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), RmgeError> {
        if self.config.test_user_id.as_deref() == Some(user_id) {
            return Ok(());
        }

        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;

        let mut state = self.repository.get_quota_state(user_id).await?;
        self.reconcile(&mut state, now);
        state.total_count += 1;
        state.weekly_count += 1;
        self.repository.save_quota_state(user_id, &state).await
    }

    /// Construct the caller-facing error for a denied check (spec.md §7
    /// "carries plan, current count, limit, reason string").
    #[must_use]
    pub fn denial_error(&self, state: &QuotaState) -> RmgeError {
        let (count, limit, reason) = match state.plan {
            Plan::Free | Plan::Expired => (
                state.total_count,
                self.config.free_total,
                "free_total_exhausted",
            ),
            Plan::Pro => (state.weekly_count, self.config.pro_weekly, "pro_weekly_exhausted"),
            Plan::Max => (state.weekly_count, self.config.max_weekly, "max_weekly_exhausted"),
        };
        RmgeError::quota_exceeded(plan_label(state.plan), count, limit, reason)
    }
}

const fn plan_label(plan: Plan) -> &'static str {
    match plan {
        Plan::Free => "free",
        Plan::Pro => "pro",
        Plan::Max => "max",
        Plan::Expired => "expired",
    }
}
