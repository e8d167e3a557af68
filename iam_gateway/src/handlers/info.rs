//! `GET /info` (spec §6.1): unauthenticated platform metadata.

use axum::{Json, extract::Extension};

use crate::dtos::InfoResponse;
use crate::middlewares::ResolvedApplication;

/// Application-scoped when an `X-App-Id`/`X-App-Secret` pair resolved
/// one; otherwise the full set the platform supports. `/info` itself is
/// unauthenticated, so `ResolvedApplication` is only present when the
/// caller chose to present credentials anyway.
pub async fn info(app: Option<Extension<ResolvedApplication>>) -> Json<InfoResponse> {
  let available_login_methods = match app {
    Some(Extension(ResolvedApplication(app))) => app
      .enabled_login_methods
      .iter()
      .map(|m| format!("{m:?}").to_lowercase())
      .collect(),
    None => vec![
      "email".to_string(),
      "phone".to_string(),
      "wechat".to_string(),
      "alipay".to_string(),
      "google".to_string(),
      "apple".to_string(),
    ],
  };

  Json(InfoResponse {
    version: env!("CARGO_PKG_VERSION").to_string(),
    supported_api_versions: vec!["v1".to_string()],
    available_login_methods,
  })
}
