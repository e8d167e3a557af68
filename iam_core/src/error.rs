//! Closed domain-error vocabulary.
//!
//! Every variant maps to exactly one `kind` / HTTP status pair at the
//! gateway boundary (`iam_gateway::error::AppError`). Nothing upstream of
//! that boundary should construct ad-hoc error strings; extend this enum
//! instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CoreError {
  #[error("invalid application or user credentials")]
  InvalidCredentials,

  #[error("invalid token")]
  InvalidToken,

  #[error("token expired")]
  TokenExpired,

  #[error("application disabled")]
  AppDisabled,

  #[error("insufficient scope")]
  InsufficientScope,

  #[error("login method disabled for this application")]
  LoginMethodDisabled,

  #[error("user not bound to this application")]
  UserNotBound,

  #[error("account locked")]
  AccountLocked,

  #[error("account not active")]
  AccountNotActive,

  #[error("verification code invalid or expired")]
  CodeInvalidOrExpired,

  #[error("user not found")]
  UserNotFound,

  #[error("email already registered")]
  ConflictEmail,

  #[error("username already registered")]
  ConflictUsername,

  #[error("phone already registered")]
  ConflictPhone,

  #[error("password does not satisfy the strength policy")]
  PasswordWeak,

  #[error("rate limit exceeded")]
  RateLimitExceeded,

  #[error("verification code send rate limited")]
  CodeSendRateLimited,

  #[error("request quota exceeded")]
  RequestQuotaExceeded,

  #[error("token quota exceeded")]
  TokenQuotaExceeded,

  #[error("application has no subscription plan bound")]
  QuotaNotConfigured,

  #[error("validation error: {0}")]
  ValidationError(String),

  #[error("upstream dependency error: {0}")]
  UpstreamError(String),

  #[error("service unavailable: {0}")]
  ServiceUnavailable(String),

  /// Catch-all for invariant violations / unexpected states. Never
  /// surfaced to a client as anything but `service_unavailable`; the
  /// detail string is logged, not echoed.
  #[error("internal error: {0}")]
  Internal(String),
}

impl CoreError {
  /// The closed `error_code` vocabulary of the wire protocol.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::InvalidCredentials => "invalid_credentials",
      Self::InvalidToken => "invalid_token",
      Self::TokenExpired => "token_expired",
      Self::AppDisabled => "app_disabled",
      Self::InsufficientScope => "insufficient_scope",
      Self::LoginMethodDisabled => "login_method_disabled",
      Self::UserNotBound => "user_not_bound",
      Self::AccountLocked => "account_locked",
      Self::AccountNotActive => "account_not_active",
      Self::CodeInvalidOrExpired => "code_invalid_or_expired",
      Self::UserNotFound => "user_not_found",
      Self::ConflictEmail => "conflict_email",
      Self::ConflictUsername => "conflict_username",
      Self::ConflictPhone => "conflict_phone",
      Self::PasswordWeak => "password_weak",
      Self::RateLimitExceeded => "rate_limit_exceeded",
      Self::CodeSendRateLimited => "code_send_rate_limited",
      Self::RequestQuotaExceeded => "request_quota_exceeded",
      Self::TokenQuotaExceeded => "token_quota_exceeded",
      Self::QuotaNotConfigured => "quota_not_configured",
      Self::ValidationError(_) => "validation_error",
      Self::UpstreamError(_) => "upstream_error",
      Self::ServiceUnavailable(_) => "service_unavailable",
      Self::Internal(_) => "service_unavailable",
    }
  }

  /// Map a database constraint violation to the precise conflict kind.
  /// Anything else collapses to a generic `ServiceUnavailable` — the
  /// gateway boundary logs the original `sqlx::Error` before this
  /// conversion runs.
  pub fn from_database_error(error: sqlx::Error) -> Self {
    if let Some(db_err) = error.as_database_error() {
      if db_err.is_unique_violation() {
        let msg = db_err.message();
        if msg.contains("email") {
          return Self::ConflictEmail;
        }
        if msg.contains("username") {
          return Self::ConflictUsername;
        }
        if msg.contains("phone") {
          return Self::ConflictPhone;
        }
        return Self::ValidationError(format!("uniqueness violation: {msg}"));
      }
      if db_err.is_foreign_key_violation() {
        return Self::ValidationError(format!("referenced row missing: {}", db_err.message()));
      }
      if db_err.is_check_violation() {
        return Self::ValidationError(format!("check violation: {}", db_err.message()));
      }
    }
    Self::ServiceUnavailable(error.to_string())
  }
}

impl From<sqlx::Error> for CoreError {
  fn from(err: sqlx::Error) -> Self {
    Self::from_database_error(err)
  }
}

impl From<jsonwebtoken::errors::Error> for CoreError {
  fn from(err: jsonwebtoken::errors::Error) -> Self {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
      ErrorKind::ExpiredSignature => Self::TokenExpired,
      _ => Self::InvalidToken,
    }
  }
}

impl From<argon2::password_hash::Error> for CoreError {
  fn from(err: argon2::password_hash::Error) -> Self {
    Self::Internal(format!("password hashing failure: {err}"))
  }
}

/// Implemented by the HTTP boundary crate to turn a `CoreError` into its
/// transport representation (status code + body).
pub trait ErrorMapper {
  type Error;

  fn map_error(error: CoreError) -> Self::Error;
}
