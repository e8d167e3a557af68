//! Append-only audit log entries (spec §3, §4.I).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ids::{AuditEntryId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
  pub id: AuditEntryId,
  pub user_id: Option<UserId>,
  pub action: String,
  pub resource_type: Option<String>,
  pub resource_id: Option<String>,
  #[sqlx(json)]
  pub details: serde_json::Value,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
  pub user_id: Option<UserId>,
  pub action: String,
  pub resource_type: Option<String>,
  pub resource_id: Option<String>,
  pub details: serde_json::Value,
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
}

impl NewAuditEntry {
  pub fn new(action: impl Into<String>) -> Self {
    Self {
      user_id: None,
      action: action.into(),
      resource_type: None,
      resource_id: None,
      details: serde_json::Value::Null,
      ip_address: None,
      user_agent: None,
    }
  }

  pub fn with_user(mut self, user_id: UserId) -> Self {
    self.user_id = Some(user_id);
    self
  }

  pub fn with_resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
    self.resource_type = Some(resource_type.into());
    self.resource_id = Some(resource_id.into());
    self
  }

  pub fn with_details(mut self, details: serde_json::Value) -> Self {
    self.details = details;
    self
  }
}
