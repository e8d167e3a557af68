//! Newtype wrappers for the entity identifiers used across the platform.
//!
//! These types prevent mixing up, say, a `RoleId` and a `PermissionId` at
//! a call site even though both are backed by `i64` in the database.

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use utoipa::ToSchema;

macro_rules! int_id {
  ($name:ident) => {
    #[derive(
      Debug,
      Clone,
      Copy,
      PartialEq,
      Eq,
      PartialOrd,
      Ord,
      Hash,
      Serialize,
      Deserialize,
      Type,
      ToSchema,
      Default,
    )]
    #[sqlx(transparent)]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name {
      fn from(id: i64) -> Self {
        $name(id)
      }
    }

    impl From<$name> for i64 {
      fn from(id: $name) -> Self {
        id.0
      }
    }

    impl $name {
      pub fn new(id: i64) -> Self {
        $name(id)
      }

      pub fn inner(&self) -> i64 {
        self.0
      }
    }
  };
}

int_id!(UserId);
int_id!(RoleId);
int_id!(PermissionId);
int_id!(OrganizationId);
int_id!(SubscriptionPlanId);
int_id!(RefreshTokenId);
int_id!(QuotaSnapshotId);
int_id!(AuditEntryId);

/// The public identifier of a registered [`Application`](crate::models::Application).
///
/// Unlike the other IDs this is a UUID rather than a sequential integer: it
/// is handed to third-party integrators and must not leak allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct AppId(pub uuid::Uuid);

impl fmt::Display for AppId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl AppId {
  pub fn new() -> Self {
    AppId(uuid::Uuid::new_v4())
  }
}

impl Default for AppId {
  fn default() -> Self {
    Self::new()
  }
}

impl From<uuid::Uuid> for AppId {
  fn from(id: uuid::Uuid) -> Self {
    AppId(id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn int_id_roundtrip() {
    let id = UserId::new(42);
    assert_eq!(id.inner(), 42);
    assert_eq!(format!("{id}"), "42");
    let back: i64 = id.into();
    assert_eq!(back, 42);
  }

  #[test]
  fn int_id_ordering_and_equality() {
    assert!(RoleId::new(1) < RoleId::new(2));
    assert_eq!(PermissionId::new(5), PermissionId::new(5));
  }

  #[test]
  fn app_id_is_unique_per_generation() {
    assert_ne!(AppId::new(), AppId::new());
  }
}
