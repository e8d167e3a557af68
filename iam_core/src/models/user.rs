//! `User` and the identity state machine's data (spec §3, §4.D).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::UserId;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
pub enum UserStatus {
  PendingVerification,
  Active,
  Locked,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
  pub id: UserId,
  pub username: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  #[serde(skip)]
  pub password_hash: String,
  pub status: UserStatus,
  pub failed_login_attempts: i32,
  pub locked_until: Option<DateTime<Utc>>,
  pub password_changed: bool,
  pub last_login_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
    matches!(self.locked_until, Some(until) if now < until) && self.status == UserStatus::Locked
  }

  pub fn into_profile(self) -> UserProfile {
    UserProfile {
      id: self.id,
      username: self.username,
      email: self.email,
      phone: self.phone,
      status: self.status,
      requires_password_change: !self.password_changed,
      created_at: self.created_at,
    }
  }
}

/// The shape a user is ever returned to a client in — never includes the
/// password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
  pub id: UserId,
  pub username: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub status: UserStatus,
  pub requires_password_change: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub username: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub password_hash: String,
  pub status: UserStatus,
}

/// Caller context attached to security-relevant operations (login,
/// refresh, logout) for audit and refresh-token-context-mismatch
/// detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthContext {
  pub user_agent: Option<String>,
  pub ip_address: Option<String>,
}

/// The platform's bootstrap super-admin account (spec §4.D): username
/// `admin`, password `123456`, `password_changed = false`.
pub const BOOTSTRAP_SUPER_ADMIN_USERNAME: &str = "admin";
pub const BOOTSTRAP_SUPER_ADMIN_PASSWORD: &str = "123456";
