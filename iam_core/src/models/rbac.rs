//! Role/permission aggregation model (spec §3, §4.E).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{PermissionId, RoleId, UserId};

pub const SYSTEM_ROLE_SUPER_ADMIN: &str = "super_admin";
pub const SYSTEM_ROLE_ADMIN: &str = "admin";
pub const SYSTEM_ROLE_USER: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
  pub id: RoleId,
  pub name: String,
  pub description: String,
  pub is_system_role: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
  pub id: PermissionId,
  pub name: String,
  pub resource: String,
  pub action: String,
}

impl Permission {
  pub fn qualified_name(resource: &str, action: &str) -> String {
    format!("{resource}:{action}")
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
  pub role_id: RoleId,
  pub permission_id: PermissionId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct UserRole {
  pub user_id: UserId,
  pub role_id: RoleId,
}

/// `user_permissions:{user_id}` cache payload — the aggregated,
/// already-deduplicated permission-name set for a user.
pub type EffectivePermissions = std::collections::HashSet<String>;
