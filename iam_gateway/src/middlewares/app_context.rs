//! Application-identity resolution (spec §4.H step 1).
//!
//! Two entry points share one result type, [`ResolvedApplication`]:
//! `app_credential_auth_middleware` verifies `X-App-Id` + `X-App-Secret`
//! for the app-credential endpoints (register/login/refresh/OAuth);
//! `bearer_app_context_middleware` runs after
//! `iam_core::middlewares::verify_bearer_token_middleware` has already
//! matched the token's `app_id` claim against the header, and only needs
//! to load the application row the later pipeline stages (scope gate,
//! rate limit, quota) require.

use axum::{
  Extension,
  body::Body,
  extract::{Request, State},
  middleware::Next,
  response::{IntoResponse, Response},
};
use iam_core::error::CoreError;
use iam_core::middlewares::{APP_ID_HEADER, APP_SECRET_HEADER};
use iam_core::models::application::{Application, ApplicationStatus};
use iam_core::models::ids::AppId;
use uuid::Uuid;

use crate::domains::application_registry::ApplicationRegistryService;
use crate::error::AppError;
use crate::state::{AppState, CallerIdentity};

#[derive(Clone)]
pub struct ResolvedApplication(pub Application);

fn header_str<'a>(req: &'a Request<Body>, name: &'static str) -> Option<&'a str> {
  req.headers().get(name)?.to_str().ok()
}

fn parse_app_id(raw: &str) -> Result<AppId, CoreError> {
  Uuid::parse_str(raw)
    .map(AppId::from)
    .map_err(|_| CoreError::InvalidCredentials)
}

/// App-credential branch: missing or wrong `X-App-Id`/`X-App-Secret` is
/// `invalid_credentials`; a disabled application is `app_disabled`.
pub async fn app_credential_auth_middleware(
  State(state): State<AppState>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let app_id_raw = header_str(&req, APP_ID_HEADER);
  let app_secret = header_str(&req, APP_SECRET_HEADER);

  let result = async {
    let app_id = parse_app_id(app_id_raw.ok_or(CoreError::InvalidCredentials)?)?;
    let secret = app_secret.ok_or(CoreError::InvalidCredentials)?;
    let applications = state.applications();
    let registry = ApplicationRegistryService::new(&applications);
    registry.verify_credentials(app_id, secret).await
  }
  .await;

  match result {
    Ok(app) => {
      let mut req = req;
      req.extensions_mut().insert(ResolvedApplication(app));
      next.run(req).await
    }
    Err(error) => AppError::from(error).into_response(),
  }
}


/// Bearer-token branch: the application is resolved from the identity
/// `verify_bearer_token_middleware` already attached, not from headers
/// again — the app-id cross-check already happened there.
pub async fn bearer_app_context_middleware(
  State(state): State<AppState>,
  Extension(identity): Extension<CallerIdentity>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let applications = state.applications();
  let registry = ApplicationRegistryService::new(&applications);
  match registry.find(identity.app_id).await {
    Ok(app) if app.status == ApplicationStatus::Active => {
      let mut req = req;
      req.extensions_mut().insert(ResolvedApplication(app));
      next.run(req).await
    }
    Ok(_) => AppError::from(CoreError::AppDisabled).into_response(),
    Err(error) => AppError::from(error).into_response(),
  }
}
