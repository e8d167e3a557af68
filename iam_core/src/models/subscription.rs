//! `SubscriptionPlan` / `UserSubscription` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{SubscriptionPlanId, UserId};

/// Sentinel meaning "unlimited" for `request_quota` / `token_quota`.
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SubscriptionPlan {
  pub id: SubscriptionPlanId,
  pub name: String,
  pub duration_days: i32,
  pub price: i64,
  pub request_quota: i64,
  pub token_quota: i64,
  pub quota_period_days: i32,
  pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
  Active,
  Cancelled,
  Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSubscription {
  pub user_id: UserId,
  pub plan_id: SubscriptionPlanId,
  pub status: SubscriptionStatus,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  pub auto_renew: bool,
}
