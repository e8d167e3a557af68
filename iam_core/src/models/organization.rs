//! `Organization` materialized-path tree (spec §3).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{OrganizationId, UserId};

pub const MAX_ORGANIZATION_LEVEL: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Organization {
  pub id: OrganizationId,
  pub parent_id: Option<OrganizationId>,
  pub name: String,
  pub path: String,
  pub level: i32,
}

impl Organization {
  /// Computes the child's path/level from its parent, enforcing the
  /// invariant `level = parent.level + 1` and that the path strictly
  /// extends the parent's (making cycles structurally impossible).
  pub fn child_of(parent: &Organization, name: &str, child_id: OrganizationId) -> Organization {
    Organization {
      id: child_id,
      parent_id: Some(parent.id),
      name: name.to_string(),
      path: format!("{}/{}", parent.path, child_id.0),
      level: parent.level + 1,
    }
  }

  pub fn root(name: &str, id: OrganizationId) -> Organization {
    Organization {
      id,
      parent_id: None,
      name: name.to_string(),
      path: format!("/{}", id.0),
      level: 0,
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct UserOrganization {
  pub user_id: UserId,
  pub org_id: OrganizationId,
}
