//! Quota counters and snapshots (spec §3, §4.G).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{AppId, QuotaSnapshotId};
use super::subscription::UNLIMITED;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotaCounter {
  pub app_id: AppId,
  pub cycle_start: DateTime<Utc>,
  pub cycle_end: DateTime<Utc>,
  pub request_used: i64,
  pub token_used: i64,
  pub override_request_limit: Option<i64>,
  pub override_token_limit: Option<i64>,
}

impl QuotaCounter {
  pub fn needs_rollover(&self, now: DateTime<Utc>) -> bool {
    now >= self.cycle_end
  }

  pub fn effective_request_limit(&self, plan_limit: i64) -> i64 {
    self.override_request_limit.unwrap_or(plan_limit)
  }

  pub fn effective_token_limit(&self, plan_limit: i64) -> i64 {
    self.override_token_limit.unwrap_or(plan_limit)
  }

  pub fn request_remaining(&self, plan_limit: i64) -> Option<i64> {
    let limit = self.effective_request_limit(plan_limit);
    if limit == UNLIMITED {
      None
    } else {
      Some((limit - self.request_used).max(0))
    }
  }

  pub fn token_remaining(&self, plan_limit: i64) -> Option<i64> {
    let limit = self.effective_token_limit(plan_limit);
    if limit == UNLIMITED {
      None
    } else {
      Some((limit - self.token_used).max(0))
    }
  }

  /// Fraction of the limit consumed, for the `X-Quota-Warning` threshold
  /// checks (80% / 100%). `None` for an unlimited quota.
  pub fn usage_fraction(used: i64, limit: i64) -> Option<f64> {
    if limit == UNLIMITED || limit == 0 {
      None
    } else {
      Some(used as f64 / limit as f64)
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "quota_reset_type", rename_all = "snake_case")]
pub enum QuotaResetType {
  Auto,
  Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotaSnapshot {
  pub id: QuotaSnapshotId,
  pub app_id: AppId,
  pub cycle_start: DateTime<Utc>,
  pub cycle_end: DateTime<Utc>,
  pub request_limit: i64,
  pub request_used: i64,
  pub token_limit: i64,
  pub token_used: i64,
  pub reset_type: QuotaResetType,
  pub created_at: DateTime<Utc>,
}

/// What a reservation call decided, handed back up through the gateway
/// pipeline so response decoration can emit the right headers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaUsage {
  pub request_quota_limit: i64,
  pub request_quota_used: i64,
  pub request_quota_remaining: i64,
  pub token_quota_limit: i64,
  pub token_quota_used: i64,
  pub token_quota_remaining: i64,
  pub billing_cycle_start: DateTime<Utc>,
  pub billing_cycle_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaWarning {
  ApproachingLimit,
  Exhausted,
}

impl QuotaWarning {
  pub fn as_header_value(self) -> &'static str {
    match self {
      Self::ApproachingLimit => "approaching_limit",
      Self::Exhausted => "exhausted",
    }
  }

  /// `>= 100%` is exhausted, `>= 80%` is approaching, else none.
  pub fn from_fraction(fraction: Option<f64>) -> Option<Self> {
    let fraction = fraction?;
    if fraction >= 1.0 {
      Some(Self::Exhausted)
    } else if fraction >= 0.8 {
      Some(Self::ApproachingLimit)
    } else {
      None
    }
  }
}
