//! Quota reserve step (spec §4.H step 5 / §4.G). Applications with no
//! subscription plan bound are not quota-accounted at all — only the
//! `GET /api/v1/quota/usage` handler treats the absence of a plan as the
//! `quota_not_configured` error, since that endpoint's whole job is to
//! report a quota that doesn't exist.

use axum::{
  body::Body,
  extract::{Request, State},
  http::HeaderValue,
  middleware::Next,
  response::{IntoResponse, Response},
};
use iam_core::error::CoreError;

use crate::domains::quota::QuotaService;
use crate::error::AppError;
use crate::middlewares::app_context::ResolvedApplication;
use crate::state::AppState;

const QUOTA_REQUEST_LIMIT_HEADER: &str = "x-quota-request-limit";
const QUOTA_REQUEST_REMAINING_HEADER: &str = "x-quota-request-remaining";
const QUOTA_REQUEST_RESET_HEADER: &str = "x-quota-request-reset";
const QUOTA_TOKEN_LIMIT_HEADER: &str = "x-quota-token-limit";
const QUOTA_TOKEN_REMAINING_HEADER: &str = "x-quota-token-remaining";
const QUOTA_TOKEN_RESET_HEADER: &str = "x-quota-token-reset";
const QUOTA_WARNING_HEADER: &str = "x-quota-warning";

pub async fn quota_gate_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
  let Some(ResolvedApplication(app)) = req.extensions().get::<ResolvedApplication>().cloned() else {
    return AppError::from(CoreError::Internal(
      "quota_gate_middleware ran before application resolution".to_string(),
    ))
    .into_response();
  };

  let quotas = state.quotas();
  let plans = state.subscription_plans();
  let quota_service = QuotaService::new(&quotas, &plans);

  let plan = match quota_service.plan_for(&app).await {
    Ok(plan) => plan,
    Err(CoreError::QuotaNotConfigured) => return next.run(req).await,
    Err(error) => return AppError::from(error).into_response(),
  };

  let counter = match quota_service.reserve_request(app.app_id, &plan).await {
    Ok(counter) => counter,
    Err(error) => return AppError::from(error).into_response(),
  };

  let warning = crate::domains::quota::warning_for(&counter, &plan);

  let mut response = next.run(req).await;
  let headers = response.headers_mut();
  let request_limit = counter.effective_request_limit(plan.request_quota);
  let token_limit = counter.effective_token_limit(plan.token_quota);
  for (name, value) in [
    (QUOTA_REQUEST_LIMIT_HEADER, request_limit),
    (
      QUOTA_REQUEST_REMAINING_HEADER,
      counter.request_remaining(plan.request_quota).unwrap_or(-1),
    ),
    (QUOTA_REQUEST_RESET_HEADER, counter.cycle_end.timestamp()),
    (QUOTA_TOKEN_LIMIT_HEADER, token_limit),
    (
      QUOTA_TOKEN_REMAINING_HEADER,
      counter.token_remaining(plan.token_quota).unwrap_or(-1),
    ),
    (QUOTA_TOKEN_RESET_HEADER, counter.cycle_end.timestamp()),
  ] {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
      headers.insert(name, value);
    }
  }
  if let Some(warning) = warning {
    if let Ok(value) = HeaderValue::from_str(warning.as_header_value()) {
      headers.insert(QUOTA_WARNING_HEADER, value);
    }
  }
  response
}
