//! `Application` — the third-party tenant registered against the
//! platform (spec §3, §4.F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

use super::ids::{AppId, OrganizationId, SubscriptionPlanId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
pub enum ApplicationStatus {
  Active,
  Disabled,
}

#[derive(
  Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema,
)]
#[sqlx(type_name = "login_method", rename_all = "snake_case")]
pub enum LoginMethod {
  Email,
  Phone,
  Wechat,
  Alipay,
  Google,
  Apple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredential {
  pub client_id: String,
  pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
  pub app_id: AppId,
  #[serde(skip)]
  pub app_secret_hash: String,
  #[serde(skip)]
  pub webhook_secret: String,
  pub name: String,
  pub status: ApplicationStatus,
  pub rate_limit: i32,
  pub subscription_plan_id: Option<SubscriptionPlanId>,
  #[sqlx(json)]
  pub enabled_login_methods: Vec<LoginMethod>,
  #[sqlx(json)]
  pub oauth_credentials: HashMap<String, OAuthCredential>,
  #[sqlx(json)]
  pub granted_scopes: Vec<String>,
  #[sqlx(json)]
  pub organization_ids: Vec<OrganizationId>,
  pub created_at: DateTime<Utc>,
}

impl Application {
  pub fn is_active(&self) -> bool {
    self.status == ApplicationStatus::Active
  }

  pub fn has_login_method(&self, method: LoginMethod) -> bool {
    self.enabled_login_methods.contains(&method)
  }

  pub fn has_scope(&self, scope: &str) -> bool {
    self.granted_scopes.iter().any(|s| s == scope)
  }

  pub fn granted_scope_set(&self) -> HashSet<&str> {
    self.granted_scopes.iter().map(String::as_str).collect()
  }
}

/// A public-facing summary of an application, returned to the creator at
/// registration time along with the one-time secret.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplicationSummary {
  pub app_id: AppId,
  pub name: String,
  pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct UserApplicationBinding {
  pub user_id: super::ids::UserId,
  pub app_id: AppId,
}
