//! `GET /api/v1/quota/usage` (spec §6.1, §4.G). Unlike the gateway
//! pipeline's quota-reserve step, a missing subscription plan here is a
//! genuine failure — this endpoint's whole job is reporting a quota.

use axum::{Extension, Json, extract::State};

use crate::domains::quota::QuotaService;
use crate::dtos::QuotaUsageResponse;
use crate::error::AppError;
use crate::middlewares::ResolvedApplication;
use crate::state::AppState;

pub async fn get_usage(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
) -> Result<Json<QuotaUsageResponse>, AppError> {
  let quotas = state.quotas();
  let plans = state.subscription_plans();
  let quota_service = QuotaService::new(&quotas, &plans);
  let plan = quota_service.plan_for(&app).await?;
  let usage = quota_service.usage(app.app_id, &plan).await?;
  Ok(Json(usage.into()))
}
