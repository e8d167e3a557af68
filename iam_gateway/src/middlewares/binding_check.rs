//! User-application binding check (spec §4.H step 6): a bearer-token
//! endpoint's resolved `user_id` must be bound to the calling
//! application. Super-admins bypass this check — see DESIGN.md for the
//! scope-qualification simplification.

use axum::{
  Extension,
  body::Body,
  extract::{Request, State},
  middleware::Next,
  response::{IntoResponse, Response},
};
use iam_core::error::CoreError;

use crate::domains::application_registry::ApplicationRegistryService;
use crate::domains::authorization::AuthorizationService;
use crate::error::AppError;
use crate::state::{AppState, CallerIdentity};

pub async fn binding_check_middleware(
  State(state): State<AppState>,
  Extension(identity): Extension<CallerIdentity>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let roles = state.roles();
  let permissions = state.permissions();
  let authorization = AuthorizationService::new(&roles, &permissions, &state);

  match authorization.is_super_admin(identity.user_id).await {
    Ok(true) => return next.run(req).await,
    Ok(false) => {}
    Err(error) => return AppError::from(error).into_response(),
  }

  let applications = state.applications();
  let registry = ApplicationRegistryService::new(&applications);
  match registry.is_user_bound(identity.app_id, identity.user_id).await {
    Ok(true) => next.run(req).await,
    Ok(false) => AppError::from(CoreError::UserNotBound).into_response(),
    Err(error) => AppError::from(error).into_response(),
  }
}
