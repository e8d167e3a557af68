//! Scope gate (spec §4.H step 3): the endpoint declares a required scope
//! (e.g. `role:write`); the calling application must have been granted
//! it.

use std::{future::Future, pin::Pin};

use axum::{
  body::Body,
  extract::Request,
  middleware::Next,
  response::{IntoResponse, Response},
};
use iam_core::error::CoreError;

use crate::error::AppError;
use crate::middlewares::app_context::ResolvedApplication;

pub fn scope_gate(
  required_scope: &'static str,
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone {
  move |req: Request<Body>, next: Next| {
    Box::pin(async move {
      let Some(ResolvedApplication(app)) = req.extensions().get::<ResolvedApplication>().cloned() else {
        return AppError::from(CoreError::Internal(
          "scope_gate ran before application resolution".to_string(),
        ))
        .into_response();
      };
      if !app.has_scope(required_scope) {
        return AppError::from(CoreError::InsufficientScope).into_response();
      }
      next.run(req).await
    })
  }
}
