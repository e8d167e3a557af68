//! HTTP-facing error type. Wraps [`iam_core::CoreError`] and renders the
//! unified error body (spec §6.3) with the status table from spec §7.

use axum::{
  Json,
  body::Body,
  response::{IntoResponse, Response},
};
use http::StatusCode;
use iam_core::error::CoreError;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("missing request header: {0}")]
  MissingHeader(&'static str),

  #[error(transparent)]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Redis(#[from] redis::RedisError),

  #[error(transparent)]
  Config(#[from] anyhow::Error),

  #[error(transparent)]
  Validation(#[from] validator::ValidationErrors),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
  pub error_code: &'static str,
  pub message: String,
  pub details: serde_json::Value,
  pub request_id: Uuid,
}

impl AppError {
  fn error_code(&self) -> &'static str {
    match self {
      AppError::Core(core) => core.kind(),
      AppError::InvalidRequest(_) => "validation_error",
      AppError::MissingHeader(_) => "validation_error",
      AppError::Validation(_) => "validation_error",
      AppError::Sqlx(_) => "service_unavailable",
      AppError::Redis(_) => "service_unavailable",
      AppError::Config(_) => "service_unavailable",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      AppError::Core(core) => status_for_kind(core.kind()),
      AppError::InvalidRequest(_) | AppError::MissingHeader(_) | AppError::Validation(_) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      AppError::Sqlx(_) | AppError::Redis(_) | AppError::Config(_) => {
        StatusCode::SERVICE_UNAVAILABLE
      }
    }
  }
}

/// Status table from spec §7. Kinds with a context-dependent status
/// (`code_invalid_or_expired`, `user_not_found`) pick the more common of
/// the two listed statuses here; handlers that need the other branch map
/// the underlying `CoreError` to a status explicitly before this point.
fn status_for_kind(kind: &str) -> StatusCode {
  match kind {
    "invalid_credentials" | "invalid_token" | "token_expired" => StatusCode::UNAUTHORIZED,
    "app_disabled"
    | "insufficient_scope"
    | "user_not_bound"
    | "account_locked"
    | "account_not_active"
    | "quota_not_configured" => StatusCode::FORBIDDEN,
    "login_method_disabled" => StatusCode::BAD_REQUEST,
    "code_invalid_or_expired" => StatusCode::UNAUTHORIZED,
    "user_not_found" => StatusCode::NOT_FOUND,
    "conflict_email" | "conflict_username" | "conflict_phone" => StatusCode::CONFLICT,
    "password_weak" => StatusCode::BAD_REQUEST,
    "rate_limit_exceeded" | "code_send_rate_limited" | "request_quota_exceeded"
    | "token_quota_exceeded" => StatusCode::TOO_MANY_REQUESTS,
    "validation_error" => StatusCode::UNPROCESSABLE_ENTITY,
    "upstream_error" => StatusCode::BAD_GATEWAY,
    "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response<Body> {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    } else {
      tracing::debug!(error = %self, "request rejected");
    }
    let body = ErrorBody {
      error_code: self.error_code(),
      message: self.to_string(),
      details: serde_json::Value::Null,
      request_id: Uuid::new_v4(),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quota_exceeded_maps_to_429() {
    let err = AppError::Core(CoreError::RequestQuotaExceeded);
    assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err.error_code(), "request_quota_exceeded");
  }

  #[test]
  fn conflict_maps_to_409() {
    let err = AppError::Core(CoreError::ConflictEmail);
    assert_eq!(err.status(), StatusCode::CONFLICT);
  }
}
