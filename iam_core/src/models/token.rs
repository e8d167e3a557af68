//! `RefreshToken` and `SSOSession` (spec §3, §4.B).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ids::{AppId, RefreshTokenId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
  pub id: RefreshTokenId,
  pub user_id: UserId,
  pub token_hash: String,
  pub app_id: Option<AppId>,
  pub expires_at: DateTime<Utc>,
  pub revoked: bool,
  pub revoked_at: Option<DateTime<Utc>>,
  pub issued_at: DateTime<Utc>,
}

impl RefreshToken {
  pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
    !self.revoked && now < self.expires_at
  }
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
  pub user_id: UserId,
  pub token_hash: String,
  pub app_id: Option<AppId>,
  pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SsoSession {
  pub id: i64,
  pub user_id: UserId,
  pub session_token_hash: String,
  pub expires_at: DateTime<Utc>,
  pub last_activity_at: DateTime<Utc>,
}

/// The triple returned by `TokenService::issue_pair`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub sso_session_token: String,
  pub expires_in: i64,
}
