//! Repository contracts for every durable entity in spec §3. Concrete
//! `sqlx`-backed implementations live in `iam_gateway::db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::CoreError;
use crate::models::*;

#[async_trait]
pub trait UserRepository: Send + Sync {
  async fn create(&self, input: &NewUser) -> Result<User, CoreError>;
  async fn find_by_id(&self, id: UserId) -> Result<Option<User>, CoreError>;
  async fn find_by_username(&self, username: &str) -> Result<Option<User>, CoreError>;
  async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;
  async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError>;
  async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, CoreError> {
    if let Some(user) = self.find_by_username(identifier).await? {
      return Ok(Some(user));
    }
    if let Some(user) = self.find_by_email(identifier).await? {
      return Ok(Some(user));
    }
    self.find_by_phone(identifier).await
  }
  async fn activate(&self, id: UserId) -> Result<(), CoreError>;
  async fn record_failed_login(
    &self,
    id: UserId,
    lock_threshold: i32,
    lock_duration_secs: i64,
  ) -> Result<User, CoreError>;
  async fn record_successful_login(&self, id: UserId, now: DateTime<Utc>) -> Result<User, CoreError>;
  async fn set_password(&self, id: UserId, password_hash: &str, password_changed: bool) -> Result<(), CoreError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
  async fn create(&self, input: NewRefreshToken) -> Result<RefreshToken, CoreError>;
  async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, CoreError>;
  async fn revoke(&self, id: RefreshTokenId) -> Result<(), CoreError>;
  async fn revoke_all_for_user(&self, user_id: UserId) -> Result<(), CoreError>;
}

#[async_trait]
pub trait SsoSessionRepository: Send + Sync {
  async fn create(&self, user_id: UserId, session_token_hash: String, expires_at: DateTime<Utc>) -> Result<SsoSession, CoreError>;
  async fn find_by_hash(&self, session_token_hash: &str) -> Result<Option<SsoSession>, CoreError>;
  async fn bump_activity(&self, id: i64, now: DateTime<Utc>) -> Result<(), CoreError>;
  async fn delete(&self, id: i64) -> Result<(), CoreError>;
  async fn delete_all_for_user(&self, user_id: UserId) -> Result<(), CoreError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
  async fn create(&self, name: &str, description: &str) -> Result<Role, CoreError>;
  async fn find_by_id(&self, id: RoleId) -> Result<Option<Role>, CoreError>;
  async fn find_by_name(&self, name: &str) -> Result<Option<Role>, CoreError>;
  async fn delete(&self, id: RoleId) -> Result<(), CoreError>;
  async fn assign_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), CoreError>;
  async fn remove_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), CoreError>;
  async fn permission_ids_for_role(&self, role_id: RoleId) -> Result<Vec<PermissionId>, CoreError>;
  async fn user_ids_holding_role(&self, role_id: RoleId) -> Result<Vec<UserId>, CoreError>;
  /// Assigns `role_id` to `user_id` if not already held; returns whether a
  /// new row was inserted (spec invariant 12: idempotent assignment).
  async fn assign_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<bool, CoreError>;
  async fn remove_from_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), CoreError>;
  async fn role_ids_for_user(&self, user_id: UserId) -> Result<Vec<RoleId>, CoreError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
  async fn create(&self, resource: &str, action: &str) -> Result<Permission, CoreError>;
  async fn find_by_id(&self, id: PermissionId) -> Result<Option<Permission>, CoreError>;
  async fn find_by_name(&self, name: &str) -> Result<Option<Permission>, CoreError>;
  async fn delete(&self, id: PermissionId) -> Result<(), CoreError>;
  async fn is_referenced_by_any_role(&self, id: PermissionId) -> Result<bool, CoreError>;
  async fn names_for_ids(&self, ids: &[PermissionId]) -> Result<Vec<String>, CoreError>;
  /// Every user who holds a role that grants this permission, directly or
  /// transitively through role aggregation — used to invalidate the
  /// authorization cache on permission deletion.
  async fn user_ids_transitively_holding(&self, id: PermissionId) -> Result<Vec<UserId>, CoreError>;
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
  /// Reserves the id a not-yet-inserted organization will have, so the
  /// caller can compute its materialized path (`Organization::root`/
  /// `child_of` need the child's id up front) before the row exists.
  async fn next_id(&self) -> Result<OrganizationId, CoreError>;
  async fn create(&self, org: Organization) -> Result<Organization, CoreError>;
  async fn find_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, CoreError>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
  async fn create(&self, app: Application) -> Result<Application, CoreError>;
  async fn find_by_id(&self, app_id: AppId) -> Result<Option<Application>, CoreError>;
  async fn update(&self, app: Application) -> Result<Application, CoreError>;
  async fn delete(&self, app_id: AppId) -> Result<(), CoreError>;
  async fn set_app_secret_hash(&self, app_id: AppId, hash: &str) -> Result<(), CoreError>;
  async fn bind_user(&self, app_id: AppId, user_id: UserId) -> Result<(), CoreError>;
  async fn is_user_bound(&self, app_id: AppId, user_id: UserId) -> Result<bool, CoreError>;
}

#[async_trait]
pub trait SubscriptionPlanRepository: Send + Sync {
  async fn find_by_id(&self, id: SubscriptionPlanId) -> Result<Option<SubscriptionPlan>, CoreError>;
}

#[async_trait]
pub trait QuotaRepository: Send + Sync {
  async fn get_or_create_counter(&self, app_id: AppId, plan: &SubscriptionPlan, now: DateTime<Utc>) -> Result<QuotaCounter, CoreError>;
  /// Atomically increments `request_used` by 1 iff the resulting value
  /// does not exceed `limit` (unless `limit == -1`). Returns the updated
  /// counter on success, `None` on a would-exceed rejection. Must be a
  /// single `UPDATE ... WHERE request_used < limit RETURNING *` (or
  /// equivalent row-level-locked compare-and-set) to satisfy invariant 9
  /// under concurrency.
  async fn try_reserve_request(&self, app_id: AppId, limit: i64) -> Result<Option<QuotaCounter>, CoreError>;
  async fn try_reserve_tokens(&self, app_id: AppId, estimated_tokens: i64, limit: i64) -> Result<Option<QuotaCounter>, CoreError>;
  /// Releases a single request-unit reservation that was not followed by
  /// a successful token reservation, so a token-budget rejection does
  /// not permanently consume the request slot it rode in on.
  async fn release_request(&self, app_id: AppId) -> Result<(), CoreError>;
  async fn commit_tokens(&self, app_id: AppId, reserved: i64, actual: i64) -> Result<(), CoreError>;
  async fn release_tokens(&self, app_id: AppId, amount: i64) -> Result<(), CoreError>;
  async fn rollover(&self, app_id: AppId, plan: &SubscriptionPlan, now: DateTime<Utc>, reset_type: QuotaResetType) -> Result<QuotaCounter, CoreError>;
  async fn set_overrides(&self, app_id: AppId, request_limit: Option<i64>, token_limit: Option<i64>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
  async fn append(&self, entry: NewAuditEntry) -> Result<(), CoreError>;
}

/// The atomic, string-keyed primitives the gateway pipeline's §5
/// concurrency model relies on: `SET NX EX`, `INCR`, `GET-and-DEL`, plain
/// TTL get/set. Backed by Redis in `iam_gateway::cache`.
#[async_trait]
pub trait CacheStore: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
  async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CoreError>;
  /// `SET key value NX EX ttl` — succeeds (returns `true`) only if the
  /// key did not already exist.
  async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, CoreError>;
  /// Atomic get-then-delete; returns the value if the key existed.
  async fn get_and_delete(&self, key: &str) -> Result<Option<String>, CoreError>;
  async fn delete(&self, key: &str) -> Result<(), CoreError>;
  /// Atomic increment of an integer counter, creating it at `amount` with
  /// `ttl_secs` if absent. Returns the new value.
  async fn incr(&self, key: &str, amount: i64, ttl_secs: u64) -> Result<i64, CoreError>;
}

/// External notification sender (spec §6.5). SMTP/SMS drivers are out of
/// scope; the core only needs this boundary.
#[async_trait]
pub trait NotificationSender: Send + Sync {
  async fn send(&self, kind: NotificationKind, to: &str, template_name: &str, variables: HashMap<String, String>) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  Email,
  Sms,
}

/// External OAuth provider client (spec §6.5).
#[async_trait]
pub trait OAuthProvider: Send + Sync {
  fn authorize_url(&self, redirect_uri: &str, state: &str) -> String;
  async fn exchange_and_fetch_profile(&self, code: &str, redirect_uri: &str) -> Result<OAuthProfile, CoreError>;
}

#[derive(Debug, Clone)]
pub struct OAuthProfile {
  pub provider_user_id: String,
  pub email: Option<String>,
  pub display_name: Option<String>,
  pub raw_tokens: serde_json::Value,
}
