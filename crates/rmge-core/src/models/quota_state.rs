// ABOUTME: Per-user quota/plan record read and incremented by QuotaGate (spec.md §3, §4.10)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free tier: lifetime total limit.
    Free,
    /// Pro tier: weekly limit.
    Pro,
    /// Max tier: weekly limit.
    Max,
    /// A pro/max subscription that lapsed and now follows free-plan rules.
    Expired,
}

/// Subscription status independent of `plan` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Subscription in good standing.
    Active,
    /// User cancelled; remains usable until `subscription_end_date`.
    Canceled,
    /// Subscription has lapsed.
    Expired,
}

/// The quota/plan record for one user, owned by an external repository and
/// read/incremented by [`crate::models::quota_state`] consumers exactly once
/// per successful generation (spec.md §3 "Lifecycles").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaState {
    /// Subscription tier.
    pub plan: Plan,
    /// Subscription status.
    pub status: SubscriptionStatus,
    /// Lifetime generation count (used for the free plan).
    pub total_count: u32,
    /// Generation count since the last weekly reset (used for pro/max).
    pub weekly_count: u32,
    /// Date of the last weekly-counter reset.
    pub last_reset_date: DateTime<Utc>,
    /// When a canceled subscription's access actually lapses.
    pub subscription_end_date: Option<DateTime<Utc>>,
}
