//! Per-application rate limit (spec §4.H step 4): a fixed one-minute
//! window sized to the application's `rate_limit` (default from config
//! when the application record doesn't carry a positive value), backed
//! by the single `INCR` primitive [`iam_core::contracts::CacheStore`]
//! exposes — the same atomicity story the teacher's Redis-backed
//! `permission_cache`-equivalent relies on, generalized to a counter.

use axum::{
  body::Body,
  extract::{Request, State},
  http::HeaderValue,
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::Utc;
use iam_core::contracts::CacheStore;
use iam_core::error::CoreError;

use crate::error::AppError;
use crate::middlewares::app_context::ResolvedApplication;
use crate::observability::metrics::record_admission_outcome;
use crate::state::AppState;

const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
  let Some(ResolvedApplication(app)) = req.extensions().get::<ResolvedApplication>().cloned() else {
    return AppError::from(CoreError::Internal(
      "rate_limit_middleware ran before application resolution".to_string(),
    ))
    .into_response();
  };

  let capacity = if app.rate_limit > 0 {
    app.rate_limit as i64
  } else {
    state.config().rate_limiting.default_capacity_per_minute as i64
  };

  let now = Utc::now().timestamp();
  let window_start = now - now.rem_euclid(60);
  let reset_at = window_start + 60;
  let ttl_secs = (reset_at - now).max(1) as u64;
  let key = format!("ratelimit:{}:{}", app.app_id, window_start);

  let count = match state.cache_store().incr(&key, 1, ttl_secs).await {
    Ok(count) => count,
    Err(error) => return AppError::from(error).into_response(),
  };

  if count > capacity {
    record_admission_outcome("rate_limited");
    let mut response = AppError::from(CoreError::RateLimitExceeded).into_response();
    decorate(response.headers_mut(), capacity, 0, reset_at);
    if let Ok(value) = HeaderValue::from_str(&ttl_secs.to_string()) {
      response.headers_mut().insert(RETRY_AFTER_HEADER, value);
    }
    return response;
  }

  record_admission_outcome("allowed");
  let remaining = (capacity - count).max(0);
  let mut response = next.run(req).await;
  decorate(response.headers_mut(), capacity, remaining, reset_at);
  response
}

fn decorate(headers: &mut axum::http::HeaderMap, limit: i64, remaining: i64, reset_at: i64) {
  for (name, value) in [
    (RATE_LIMIT_LIMIT_HEADER, limit),
    (RATE_LIMIT_REMAINING_HEADER, remaining),
    (RATE_LIMIT_RESET_HEADER, reset_at),
  ] {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
      headers.insert(name, value);
    }
  }
}
