//! Inbound request bodies (spec §6.1), validated the way the teacher's
//! `dtos/models/requests/auth.rs` validates its bodies with `validator`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterEmailRequest {
  #[validate(email(message = "invalid email format"))]
  pub email: String,
  #[validate(length(min = 1, message = "password is required"))]
  pub password: String,
  pub username: Option<String>,
  pub verification_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterPhoneRequest {
  #[validate(length(min = 1, message = "phone is required"))]
  pub phone: String,
  #[validate(length(min = 1, message = "verification_code is required"))]
  pub verification_code: String,
  #[validate(length(min = 1, message = "password is required"))]
  pub password: String,
  pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SendEmailCodeRequest {
  #[validate(email(message = "invalid email format"))]
  pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SendSmsCodeRequest {
  #[validate(length(min = 1, message = "phone is required"))]
  pub phone: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
  #[validate(length(min = 1, message = "identifier is required"))]
  pub identifier: String,
  #[validate(length(min = 1, message = "password is required"))]
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginPhoneCodeRequest {
  #[validate(length(min = 1, message = "phone is required"))]
  pub phone: String,
  #[validate(length(min = 1, message = "code is required"))]
  pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginEmailCodeRequest {
  #[validate(email(message = "invalid email format"))]
  pub email: String,
  #[validate(length(min = 1, message = "code is required"))]
  pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OAuthLoginRequest {
  #[validate(length(min = 1, message = "code is required"))]
  pub code: String,
  pub redirect_uri: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
  #[validate(length(min = 1, message = "refresh_token is required"))]
  pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LogoutRequest {
  #[validate(length(min = 1, message = "refresh_token is required"))]
  pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
  #[validate(length(min = 1, message = "old_password is required"))]
  pub old_password: String,
  #[validate(length(min = 1, message = "new_password is required"))]
  pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AssignRolesRequest {
  #[validate(length(min = 1, message = "role_ids must not be empty"))]
  pub role_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckPermissionRequest {
  #[validate(length(min = 1, message = "permission is required"))]
  pub permission: String,
}
