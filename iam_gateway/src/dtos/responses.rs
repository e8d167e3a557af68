//! Outbound response bodies (spec §6.1, §6.3). `request_id` is not a
//! field here — `middlewares::response_decoration` stamps it into every
//! body centrally, success or error alike.

use std::collections::HashMap;

use iam_core::models::ids::{RoleId, UserId};
use iam_core::models::quota::QuotaUsage;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
  pub id: UserId,
  pub username: String,
  pub email: Option<String>,
  pub requires_password_change: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub sso_session_token: String,
  pub token_type: String,
  pub expires_in: i64,
  pub user: UserSummary,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_new_user: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
  pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeResponse {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleIdsResponse {
  pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionsResponse {
  pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckPermissionResponse {
  pub has_permission: bool,
}

/// `QuotaUsage` plus the one wire field the domain model doesn't carry:
/// `billing_cycle_reset`, the timestamp the current cycle rolls over at
/// (spec §6.1 names it distinctly from `billing_cycle_end`, which this
/// crate treats as the same instant).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuotaUsageResponse {
  pub request_quota_limit: i64,
  pub request_quota_used: i64,
  pub request_quota_remaining: i64,
  pub token_quota_limit: i64,
  pub token_quota_used: i64,
  pub token_quota_remaining: i64,
  pub billing_cycle_start: chrono::DateTime<chrono::Utc>,
  pub billing_cycle_end: chrono::DateTime<chrono::Utc>,
  pub billing_cycle_reset: chrono::DateTime<chrono::Utc>,
}

impl From<QuotaUsage> for QuotaUsageResponse {
  fn from(usage: QuotaUsage) -> Self {
    Self {
      request_quota_limit: usage.request_quota_limit,
      request_quota_used: usage.request_quota_used,
      request_quota_remaining: usage.request_quota_remaining,
      token_quota_limit: usage.token_quota_limit,
      token_quota_used: usage.token_quota_used,
      token_quota_remaining: usage.token_quota_remaining,
      billing_cycle_start: usage.billing_cycle_start,
      billing_cycle_end: usage.billing_cycle_end,
      billing_cycle_reset: usage.billing_cycle_end,
    }
  }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
  pub status: String,
  pub components: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InfoResponse {
  pub version: String,
  pub supported_api_versions: Vec<String>,
  pub available_login_methods: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
  pub success: bool,
}

/// Invariant 12: assigning an already-held role is a no-op, not an
/// error — `assigned_count` tells the caller how many of the requested
/// roles were newly granted versus already present.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignRolesResponse {
  pub success: bool,
  pub assigned_count: usize,
}
