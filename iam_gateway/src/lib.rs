//! Router assembly: the gateway admission pipeline (spec §4.H) composed
//! per route group the way the teacher's `get_router` assembles
//! independently middleware-stacked route groups and merges them, minus
//! the teacher's bespoke extension-based router builder — this crate's
//! pipeline is linear enough that `axum::middleware::from_fn[_with_state]`
//! chained directly onto each route group reads clearly without it.

pub mod cache;
pub mod config;
pub mod db;
pub mod domains;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod observability;
pub mod openapi;
pub mod services;
pub mod state;

use axum::{
  Router,
  middleware::from_fn,
  middleware::from_fn_with_state,
  routing::{get, post},
};
use iam_core::middlewares::{request_id_middleware, verify_bearer_token_middleware};
use iam_core::models::application::LoginMethod;

use crate::middlewares::{
  app_credential_auth_middleware, bearer_app_context_middleware, binding_check_middleware, login_method_gate,
  quota_gate_middleware, rate_limit_middleware, response_decoration_middleware, scope_gate,
};
use crate::openapi::OpenApiRouter;
use crate::state::{AppState, CallerIdentity};

/// Wraps an app-credential-authenticated route with steps 1-5 of the
/// pipeline, outermost to innermost: identity extraction, login-method
/// gate (only for routes that name one), scope gate, rate limit, quota
/// reserve.
fn app_credential_route(
  state: &AppState,
  router: Router<AppState>,
  scope: &'static str,
  login_method: Option<LoginMethod>,
) -> Router<AppState> {
  let router = router
    .route_layer(from_fn_with_state(state.clone(), quota_gate_middleware))
    .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
    .route_layer(from_fn(scope_gate(scope)));
  let router = match login_method {
    Some(method) => router.route_layer(from_fn(login_method_gate(method))),
    None => router,
  };
  router.route_layer(from_fn_with_state(state.clone(), app_credential_auth_middleware))
}

/// Wraps a bearer-token-authenticated route with steps 1, 3-6: identity
/// extraction (token verify + app context), scope gate, rate limit,
/// quota reserve, user-application binding check.
fn bearer_route(state: &AppState, router: Router<AppState>, scope: &'static str) -> Router<AppState> {
  router
    .route_layer(from_fn_with_state(state.clone(), binding_check_middleware))
    .route_layer(from_fn_with_state(state.clone(), quota_gate_middleware))
    .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
    .route_layer(from_fn(scope_gate(scope)))
    .route_layer(from_fn_with_state(state.clone(), bearer_app_context_middleware))
    .route_layer(from_fn_with_state(
      state.clone(),
      verify_bearer_token_middleware::<AppState, CallerIdentity>,
    ))
}

fn app_credential_routes(state: &AppState) -> Router<AppState> {
  let mut merged = Router::new();
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/register/email", post(handlers::auth::register_email)),
    "auth:register",
    Some(LoginMethod::Email),
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/register/phone", post(handlers::auth::register_phone)),
    "auth:register",
    Some(LoginMethod::Phone),
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/send-email-code", post(handlers::auth::send_email_code)),
    "auth:register",
    Some(LoginMethod::Email),
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/send-sms", post(handlers::auth::send_sms_code)),
    "auth:register",
    Some(LoginMethod::Phone),
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/login", post(handlers::auth::login)),
    "auth:login",
    None,
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/login/phone-code", post(handlers::auth::login_phone_code)),
    "auth:login",
    Some(LoginMethod::Phone),
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/login/email-code", post(handlers::auth::login_email_code)),
    "auth:login",
    Some(LoginMethod::Email),
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/oauth/{provider}", post(handlers::auth::oauth_login)),
    "auth:login",
    None,
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/refresh", post(handlers::auth::refresh)),
    "auth:refresh",
    None,
  ));
  merged = merged.merge(app_credential_route(
    state,
    Router::new().route("/auth/logout", post(handlers::auth::logout)),
    "auth:logout",
    None,
  ));
  merged
}

fn bearer_routes(state: &AppState) -> Router<AppState> {
  let mut merged = Router::new();
  merged = merged.merge(bearer_route(
    state,
    Router::new().route("/users/{user_id}", get(handlers::users::get_profile)),
    "user:read",
  ));
  merged = merged.merge(bearer_route(
    state,
    Router::new().route("/auth/change-password", post(handlers::users::change_password)),
    "auth:password",
  ));
  merged = merged.merge(bearer_route(
    state,
    Router::new().route(
      "/users/{user_id}/roles",
      get(handlers::users::get_roles).post(handlers::users::assign_roles),
    ),
    "role:write",
  ));
  merged = merged.merge(bearer_route(
    state,
    Router::new().route("/users/{user_id}/roles/{role_id}", axum::routing::delete(handlers::users::remove_role)),
    "role:write",
  ));
  merged = merged.merge(bearer_route(
    state,
    Router::new().route("/users/{user_id}/permissions", get(handlers::users::get_permissions)),
    "permission:read",
  ));
  merged = merged.merge(bearer_route(
    state,
    Router::new().route(
      "/users/{user_id}/permissions/check",
      post(handlers::users::check_permission),
    ),
    "permission:read",
  ));
  merged = merged.merge(bearer_route(
    state,
    Router::new().route("/quota/usage", get(handlers::quota::get_usage)),
    "quota:read",
  ));
  merged
}

pub fn build_router(state: AppState) -> Router {
  let gateway = Router::new()
    .merge(app_credential_routes(&state))
    .merge(bearer_routes(&state));

  let public = Router::new()
    .route("/health", get(handlers::health::health))
    .route("/info", get(handlers::info::info))
    .openapi_routes();

  Router::new()
    .nest("/api/v1/gateway", gateway)
    .merge(public)
    .layer(from_fn(response_decoration_middleware))
    .layer(from_fn(request_id_middleware))
    .with_state(state)
}
