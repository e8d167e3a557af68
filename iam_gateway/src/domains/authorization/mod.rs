//! RBAC authorization engine with short-TTL caching (spec §4.E).
//!
//! The per-request cache is the generic `WithCache<(UserId, String), bool>`
//! implemented by `AppState` (`iam_gateway::state`); the super-admin flag
//! shares the same map under the sentinel permission name
//! [`SUPER_ADMIN_CACHE_KEY`] rather than a second map, since both entries
//! have the same shape (a cached boolean keyed by user) and the same
//! invalidation trigger.

use std::collections::HashSet;

use iam_core::contracts::{PermissionRepository, RoleRepository};
use iam_core::error::CoreError;
use iam_core::models::ids::{PermissionId, RoleId, UserId};
use iam_core::models::rbac::SYSTEM_ROLE_SUPER_ADMIN;
use iam_core::state::WithCache;

/// Permission-cache TTL (spec §4.E: "short TTL, default 300 s"). The
/// concrete cache backing `AppState` enforces its own TTL internally;
/// this constant is passed through for caches that honor it directly.
pub const PERMISSION_CACHE_TTL_SECS: u64 = 300;

const SUPER_ADMIN_CACHE_KEY: &str = "__super_admin__";

/// Bulk invalidation beyond single-key removal — clearing every cached
/// decision for a user in one call, which `WithCache::remove_from_cache`
/// cannot express since it only knows one `(user_id, permission)` pair at
/// a time. `AppState` implements this directly against its `DashMap`.
pub trait PermissionCacheInvalidation {
  fn invalidate_user(&self, user_id: UserId);
}

pub struct AuthorizationService<'a, RR, PR, C> {
  pub roles: &'a RR,
  pub permissions: &'a PR,
  pub cache: &'a C,
}

impl<'a, RR, PR, C> AuthorizationService<'a, RR, PR, C>
where
  RR: RoleRepository,
  PR: PermissionRepository,
  C: WithCache<(UserId, String), bool> + PermissionCacheInvalidation,
{
  pub fn new(roles: &'a RR, permissions: &'a PR, cache: &'a C) -> Self {
    Self {
      roles,
      permissions,
      cache,
    }
  }

  /// `is_super_admin(user_id)` (spec §4.E). Cached under
  /// [`SUPER_ADMIN_CACHE_KEY`].
  pub async fn is_super_admin(&self, user_id: UserId) -> Result<bool, CoreError> {
    let key = (user_id, SUPER_ADMIN_CACHE_KEY.to_string());
    if let Some(cached) = self.cache.get_from_cache(&key) {
      return Ok(cached);
    }
    let role = self.roles.find_by_name(SYSTEM_ROLE_SUPER_ADMIN).await?;
    let is_admin = match role {
      Some(role) => self
        .roles
        .role_ids_for_user(user_id)
        .await?
        .contains(&role.id),
      None => false,
    };
    self
      .cache
      .insert_into_cache(key, is_admin, PERMISSION_CACHE_TTL_SECS);
    Ok(is_admin)
  }

  /// Union of every permission attached to every role the user holds
  /// (spec §4.E). Not itself cached as a set — `has_permission` caches
  /// per-permission decisions, which is the only shape the gateway
  /// pipeline's hot path (a single permission check per request) needs.
  pub async fn effective_permissions(&self, user_id: UserId) -> Result<HashSet<String>, CoreError> {
    let role_ids = self.roles.role_ids_for_user(user_id).await?;
    let mut permission_ids = Vec::new();
    for role_id in role_ids {
      permission_ids.extend(self.roles.permission_ids_for_role(role_id).await?);
    }
    permission_ids.sort_unstable_by_key(|id| id.inner());
    permission_ids.dedup();
    Ok(
      self
        .permissions
        .names_for_ids(&permission_ids)
        .await?
        .into_iter()
        .collect(),
    )
  }

  /// `has_permission(user_id, perm_name)` with the super-admin bypass
  /// (invariant 7) and the short-TTL cache (invariant 8: after
  /// `assign_role` returns, the next check must not read a stale
  /// `false`).
  pub async fn has_permission(&self, user_id: UserId, perm_name: &str) -> Result<bool, CoreError> {
    if self.is_super_admin(user_id).await? {
      return Ok(true);
    }
    let key = (user_id, perm_name.to_string());
    if let Some(cached) = self.cache.get_from_cache(&key) {
      return Ok(cached);
    }
    let granted = self.effective_permissions(user_id).await?.contains(perm_name);
    self
      .cache
      .insert_into_cache(key, granted, PERMISSION_CACHE_TTL_SECS);
    Ok(granted)
  }

  /// Assigns `role_id` to `user_id`; returns whether a new row was
  /// inserted (invariant 12). Invalidates the user's cache before
  /// returning success regardless, since even a no-op assignment should
  /// not leave a stale cache entry behind from an unrelated check.
  pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, CoreError> {
    let inserted = self.roles.assign_to_user(user_id, role_id).await?;
    self.cache.invalidate_user(user_id);
    Ok(inserted)
  }

  pub async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), CoreError> {
    self.roles.remove_from_user(user_id, role_id).await?;
    self.cache.invalidate_user(user_id);
    Ok(())
  }

  /// Assigns a permission to a role, invalidating every user currently
  /// holding that role.
  pub async fn assign_permission_to_role(
    &self,
    role_id: RoleId,
    permission_id: PermissionId,
  ) -> Result<(), CoreError> {
    self.roles.assign_permission(role_id, permission_id).await?;
    for user_id in self.roles.user_ids_holding_role(role_id).await? {
      self.cache.invalidate_user(user_id);
    }
    Ok(())
  }

  pub async fn remove_permission_from_role(
    &self,
    role_id: RoleId,
    permission_id: PermissionId,
  ) -> Result<(), CoreError> {
    let holders = self.roles.user_ids_holding_role(role_id).await?;
    self.roles.remove_permission(role_id, permission_id).await?;
    for user_id in holders {
      self.cache.invalidate_user(user_id);
    }
    Ok(())
  }

  pub async fn delete_role(&self, role_id: RoleId) -> Result<(), CoreError> {
    let holders = self.roles.user_ids_holding_role(role_id).await?;
    self.roles.delete(role_id).await?;
    for user_id in holders {
      self.cache.invalidate_user(user_id);
    }
    Ok(())
  }

  /// Deletes a permission, invalidating every user who held it
  /// transitively through any role.
  pub async fn delete_permission(&self, permission_id: PermissionId) -> Result<(), CoreError> {
    let holders = self.permissions.user_ids_transitively_holding(permission_id).await?;
    if self.permissions.is_referenced_by_any_role(permission_id).await? {
      return Err(CoreError::ValidationError(
        "permission is still attached to a role".to_string(),
      ));
    }
    self.permissions.delete(permission_id).await?;
    for user_id in holders {
      self.cache.invalidate_user(user_id);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use iam_core::models::rbac::{Permission, Role};

  use super::*;

  #[derive(Default)]
  struct FakeRoles {
    roles: Mutex<Vec<Role>>,
    role_permissions: Mutex<Vec<(RoleId, PermissionId)>>,
    user_roles: Mutex<Vec<(UserId, RoleId)>>,
  }

  #[async_trait]
  impl RoleRepository for FakeRoles {
    async fn create(&self, name: &str, description: &str) -> Result<Role, CoreError> {
      let id = RoleId::new(self.roles.lock().unwrap().len() as i64 + 1);
      let role = Role { id, name: name.to_string(), description: description.to_string(), is_system_role: false };
      self.roles.lock().unwrap().push(role.clone());
      Ok(role)
    }
    async fn find_by_id(&self, id: RoleId) -> Result<Option<Role>, CoreError> {
      Ok(self.roles.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, CoreError> {
      Ok(self.roles.lock().unwrap().iter().find(|r| r.name == name).cloned())
    }
    async fn delete(&self, id: RoleId) -> Result<(), CoreError> {
      self.roles.lock().unwrap().retain(|r| r.id != id);
      Ok(())
    }
    async fn assign_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), CoreError> {
      self.role_permissions.lock().unwrap().push((role_id, permission_id));
      Ok(())
    }
    async fn remove_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), CoreError> {
      self.role_permissions.lock().unwrap().retain(|(r, p)| !(*r == role_id && *p == permission_id));
      Ok(())
    }
    async fn permission_ids_for_role(&self, role_id: RoleId) -> Result<Vec<PermissionId>, CoreError> {
      Ok(self.role_permissions.lock().unwrap().iter().filter(|(r, _)| *r == role_id).map(|(_, p)| *p).collect())
    }
    async fn user_ids_holding_role(&self, role_id: RoleId) -> Result<Vec<UserId>, CoreError> {
      Ok(self.user_roles.lock().unwrap().iter().filter(|(_, r)| *r == role_id).map(|(u, _)| *u).collect())
    }
    async fn assign_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<bool, CoreError> {
      let mut rows = self.user_roles.lock().unwrap();
      if rows.contains(&(user_id, role_id)) {
        return Ok(false);
      }
      rows.push((user_id, role_id));
      Ok(true)
    }
    async fn remove_from_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), CoreError> {
      self.user_roles.lock().unwrap().retain(|(u, r)| !(*u == user_id && *r == role_id));
      Ok(())
    }
    async fn role_ids_for_user(&self, user_id: UserId) -> Result<Vec<RoleId>, CoreError> {
      Ok(self.user_roles.lock().unwrap().iter().filter(|(u, _)| *u == user_id).map(|(_, r)| r).copied().collect())
    }
  }

  #[derive(Default)]
  struct FakePermissions {
    permissions: Mutex<Vec<Permission>>,
    referenced: Mutex<bool>,
  }

  #[async_trait]
  impl PermissionRepository for FakePermissions {
    async fn create(&self, resource: &str, action: &str) -> Result<Permission, CoreError> {
      let id = PermissionId::new(self.permissions.lock().unwrap().len() as i64 + 1);
      let permission = Permission { id, name: Permission::qualified_name(resource, action), resource: resource.to_string(), action: action.to_string() };
      self.permissions.lock().unwrap().push(permission.clone());
      Ok(permission)
    }
    async fn find_by_id(&self, id: PermissionId) -> Result<Option<Permission>, CoreError> {
      Ok(self.permissions.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }
    async fn find_by_name(&self, name: &str) -> Result<Option<Permission>, CoreError> {
      Ok(self.permissions.lock().unwrap().iter().find(|p| p.name == name).cloned())
    }
    async fn delete(&self, id: PermissionId) -> Result<(), CoreError> {
      self.permissions.lock().unwrap().retain(|p| p.id != id);
      Ok(())
    }
    async fn is_referenced_by_any_role(&self, _id: PermissionId) -> Result<bool, CoreError> {
      Ok(*self.referenced.lock().unwrap())
    }
    async fn names_for_ids(&self, ids: &[PermissionId]) -> Result<Vec<String>, CoreError> {
      Ok(
        self
          .permissions
          .lock()
          .unwrap()
          .iter()
          .filter(|p| ids.contains(&p.id))
          .map(|p| p.name.clone())
          .collect(),
      )
    }
    async fn user_ids_transitively_holding(&self, _id: PermissionId) -> Result<Vec<UserId>, CoreError> {
      Ok(vec![])
    }
  }

  #[derive(Default)]
  struct FakeCache {
    entries: Mutex<std::collections::HashMap<(UserId, String), bool>>,
    invalidated: Mutex<Vec<UserId>>,
  }

  impl WithCache<(UserId, String), bool> for FakeCache {
    fn get_from_cache(&self, key: &(UserId, String)) -> Option<bool> {
      self.entries.lock().unwrap().get(key).copied()
    }
    fn insert_into_cache(&self, key: (UserId, String), value: bool, _ttl_seconds: u64) {
      self.entries.lock().unwrap().insert(key, value);
    }
    fn remove_from_cache(&self, key: &(UserId, String)) {
      self.entries.lock().unwrap().remove(key);
    }
  }

  impl PermissionCacheInvalidation for FakeCache {
    fn invalidate_user(&self, user_id: UserId) {
      self.invalidated.lock().unwrap().push(user_id);
      self.entries.lock().unwrap().retain(|(uid, _), _| *uid != user_id);
    }
  }

  #[tokio::test]
  async fn super_admin_bypasses_explicit_permission_checks() {
    let roles = FakeRoles::default();
    let permissions = FakePermissions::default();
    let cache = FakeCache::default();
    let service = AuthorizationService::new(&roles, &permissions, &cache);
    let admin_role = roles.create(SYSTEM_ROLE_SUPER_ADMIN, "full access").await.unwrap();
    let user_id = UserId::new(1);
    service.assign_role(user_id, admin_role.id).await.unwrap();

    assert!(service.has_permission(user_id, "anything:whatsoever").await.unwrap());
  }

  #[tokio::test]
  async fn assigning_a_role_invalidates_the_stale_cached_decision() {
    let roles = FakeRoles::default();
    let permissions = FakePermissions::default();
    let cache = FakeCache::default();
    let service = AuthorizationService::new(&roles, &permissions, &cache);
    let role = roles.create("editor", "content editor").await.unwrap();
    let permission = permissions.create("role", "write").await.unwrap();
    roles.assign_permission(role.id, permission.id).await.unwrap();
    let user_id = UserId::new(2);

    assert!(!service.has_permission(user_id, "role:write").await.unwrap());
    service.assign_role(user_id, role.id).await.unwrap();
    assert!(service.has_permission(user_id, "role:write").await.unwrap());
  }

  #[tokio::test]
  async fn assign_to_user_is_idempotent() {
    let roles = FakeRoles::default();
    let permissions = FakePermissions::default();
    let cache = FakeCache::default();
    let service = AuthorizationService::new(&roles, &permissions, &cache);
    let role = roles.create("viewer", "read-only").await.unwrap();
    let user_id = UserId::new(3);

    assert!(service.assign_role(user_id, role.id).await.unwrap());
    assert!(!service.assign_role(user_id, role.id).await.unwrap());
  }

  #[tokio::test]
  async fn deleting_a_referenced_permission_is_rejected() {
    let roles = FakeRoles::default();
    let permissions = FakePermissions::default();
    let cache = FakeCache::default();
    let service = AuthorizationService::new(&roles, &permissions, &cache);
    let permission = permissions.create("user", "read").await.unwrap();
    *permissions.referenced.lock().unwrap() = true;

    let result = service.delete_permission(permission.id).await;
    assert!(matches!(result, Err(CoreError::ValidationError(_))));
    assert!(permissions.permissions.lock().unwrap().iter().any(|p| p.id == permission.id));
  }

  #[tokio::test]
  async fn deleting_an_unreferenced_permission_invalidates_holders() {
    let roles = FakeRoles::default();
    let permissions = FakePermissions::default();
    let cache = FakeCache::default();
    let service = AuthorizationService::new(&roles, &permissions, &cache);
    let permission = permissions.create("user", "read").await.unwrap();

    service.delete_permission(permission.id).await.unwrap();
    assert!(permissions.permissions.lock().unwrap().iter().all(|p| p.id != permission.id));
  }
}
