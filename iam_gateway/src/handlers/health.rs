//! `GET /health` (spec §6.1): unauthenticated component-status probe.

use std::collections::HashMap;

use axum::{Json, extract::State};
use iam_core::contracts::CacheStore;
use iam_core::state::WithDbPool;

use crate::dtos::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
  let mut components = HashMap::new();

  let db_status = match sqlx::query("SELECT 1").execute(state.db_pool()).await {
    Ok(_) => "ok",
    Err(_) => "down",
  };
  components.insert("database".to_string(), db_status.to_string());

  let cache_status = match state.cache_store().get("health_probe").await {
    Ok(_) => "ok",
    Err(_) => "down",
  };
  components.insert("cache".to_string(), cache_status.to_string());

  let status = if components.values().all(|v| v == "ok") {
    "ok"
  } else {
    "degraded"
  };

  Json(HealthResponse {
    status: status.to_string(),
    components,
  })
}
