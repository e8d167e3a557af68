//! Login-method gate (spec §4.H step 2): the endpoint's target login
//! method must be enabled on the calling application.

use std::{future::Future, pin::Pin};

use axum::{
  body::Body,
  extract::Request,
  middleware::Next,
  response::{IntoResponse, Response},
};
use iam_core::error::CoreError;
use iam_core::models::application::LoginMethod;

use crate::error::AppError;
use crate::middlewares::app_context::ResolvedApplication;

/// Builds a per-route middleware checking that `method` is in the
/// application's `enabled_login_methods`, mirroring the
/// `require_permission(Permission)` middleware-factory shape.
pub fn login_method_gate(
  method: LoginMethod,
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone {
  move |req: Request<Body>, next: Next| {
    Box::pin(async move {
      let Some(ResolvedApplication(app)) = req.extensions().get::<ResolvedApplication>().cloned() else {
        return AppError::from(CoreError::Internal(
          "login_method_gate ran before application resolution".to_string(),
        ))
        .into_response();
      };
      if !app.has_login_method(method) {
        return AppError::from(CoreError::LoginMethodDisabled).into_response();
      }
      next.run(req).await
    })
  }
}

#[cfg(test)]
mod tests {
  use axum::{Extension, Router, http::StatusCode, middleware::from_fn, routing::get};
  use chrono::Utc;
  use iam_core::models::application::{Application, ApplicationStatus};
  use iam_core::models::ids::AppId;
  use tower::ServiceExt;

  use super::*;

  fn test_app(enabled_login_methods: Vec<LoginMethod>) -> Application {
    Application {
      app_id: AppId::new(),
      app_secret_hash: String::new(),
      webhook_secret: String::new(),
      name: "test-app".to_string(),
      status: ApplicationStatus::Active,
      rate_limit: 60,
      subscription_plan_id: None,
      enabled_login_methods,
      oauth_credentials: Default::default(),
      granted_scopes: vec![],
      organization_ids: vec![],
      created_at: Utc::now(),
    }
  }

  fn router_with_app(app: Application, method: LoginMethod) -> Router {
    Router::new()
      .route("/", get(|| async { "ok" }))
      .layer(from_fn(login_method_gate(method)))
      .layer(Extension(ResolvedApplication(app)))
  }

  #[tokio::test]
  async fn allows_enabled_method() {
    let app = router_with_app(test_app(vec![LoginMethod::Email]), LoginMethod::Email);
    let response = app
      .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn rejects_disabled_method() {
    let app = router_with_app(test_app(vec![LoginMethod::Email]), LoginMethod::Phone);
    let response = app
      .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }
}
