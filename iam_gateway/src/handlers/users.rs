//! Bearer-token-authenticated user endpoints: profile, password change,
//! role/permission management (spec §6.1, §4.D, §4.E).

use axum::{Extension, Json, extract::Path, extract::State};
use iam_core::contracts::{RoleRepository, UserRepository};
use iam_core::error::CoreError;
use iam_core::models::audit::NewAuditEntry;
use iam_core::models::ids::{RoleId, UserId};
use iam_core::services::token_domain::TokenDomainService;
use iam_core::state::WithTokenManager;
use validator::Validate;

use crate::domains::authorization::AuthorizationService;
use crate::domains::identity::IdentityService;
use crate::dtos::{
  AssignRolesRequest, AssignRolesResponse, CheckPermissionRequest, CheckPermissionResponse, ChangePasswordRequest,
  PermissionsResponse, RoleIdsResponse, SuccessResponse,
};
use crate::error::AppError;
use crate::state::{AppState, CallerIdentity};

pub async fn get_profile(
  State(state): State<AppState>,
  Extension(_identity): Extension<CallerIdentity>,
  Path(user_id): Path<i64>,
) -> Result<Json<iam_core::models::UserProfile>, AppError> {
  let user = state
    .users()
    .find_by_id(UserId::from(user_id))
    .await?
    .ok_or(CoreError::UserNotFound)?;
  Ok(Json(user.into_profile()))
}

pub async fn change_password(
  State(state): State<AppState>,
  Extension(identity): Extension<CallerIdentity>,
  Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
  body.validate()?;
  let users = state.users();
  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let identity_service = IdentityService::new(
    &users,
    &token_domain,
    state.config().auth.lockout_threshold,
    state.config().auth.lockout_duration_secs,
  );
  identity_service
    .change_password(identity.user_id, &body.old_password, &body.new_password)
    .await?;
  state
    .audit_service()
    .record(NewAuditEntry::new("user.change_password").with_user(identity.user_id));
  Ok(Json(SuccessResponse { success: true }))
}

pub async fn get_roles(
  State(state): State<AppState>,
  Extension(_identity): Extension<CallerIdentity>,
  Path(user_id): Path<i64>,
) -> Result<Json<RoleIdsResponse>, AppError> {
  let roles = state.roles();
  let role_ids = roles.role_ids_for_user(UserId::from(user_id)).await?;
  Ok(Json(RoleIdsResponse { role_ids }))
}

pub async fn assign_roles(
  State(state): State<AppState>,
  Extension(_identity): Extension<CallerIdentity>,
  Path(user_id): Path<i64>,
  Json(body): Json<AssignRolesRequest>,
) -> Result<Json<AssignRolesResponse>, AppError> {
  body.validate()?;
  let roles = state.roles();
  let permissions = state.permissions();
  let authorization = AuthorizationService::new(&roles, &permissions, &state);
  let user_id = UserId::from(user_id);
  let mut assigned_count = 0;
  for role_id in body.role_ids {
    if authorization.assign_role(user_id, RoleId::from(role_id)).await? {
      assigned_count += 1;
    }
  }
  Ok(Json(AssignRolesResponse {
    success: true,
    assigned_count,
  }))
}

pub async fn remove_role(
  State(state): State<AppState>,
  Extension(_identity): Extension<CallerIdentity>,
  Path((user_id, role_id)): Path<(i64, i64)>,
) -> Result<Json<SuccessResponse>, AppError> {
  let roles = state.roles();
  let permissions = state.permissions();
  let authorization = AuthorizationService::new(&roles, &permissions, &state);
  authorization
    .remove_role(UserId::from(user_id), RoleId::from(role_id))
    .await?;
  Ok(Json(SuccessResponse { success: true }))
}

pub async fn get_permissions(
  State(state): State<AppState>,
  Extension(_identity): Extension<CallerIdentity>,
  Path(user_id): Path<i64>,
) -> Result<Json<PermissionsResponse>, AppError> {
  let roles = state.roles();
  let permissions = state.permissions();
  let authorization = AuthorizationService::new(&roles, &permissions, &state);
  let names = authorization.effective_permissions(UserId::from(user_id)).await?;
  Ok(Json(PermissionsResponse {
    permissions: names.into_iter().collect(),
  }))
}

pub async fn check_permission(
  State(state): State<AppState>,
  Extension(_identity): Extension<CallerIdentity>,
  Path(user_id): Path<i64>,
  Json(body): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>, AppError> {
  body.validate()?;
  let roles = state.roles();
  let permissions = state.permissions();
  let authorization = AuthorizationService::new(&roles, &permissions, &state);
  let has_permission = authorization
    .has_permission(UserId::from(user_id), &body.permission)
    .await?;
  Ok(Json(CheckPermissionResponse { has_permission }))
}
