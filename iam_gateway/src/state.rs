//! Runtime context carried through every handler (spec §9), following the
//! teacher's `Arc<AppStateInner>` + `Deref` shape.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use iam_core::{
  error::{CoreError, ErrorMapper},
  jwt::TokenManager,
  middlewares::{AppBoundClaims, TokenVerifier},
  models::ids::{AppId, UserId},
  state::{WithCache, WithDbPool, WithTokenManager},
};
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use crate::cache::RedisCacheStore;
use crate::config::AppConfig;
use crate::db::{
  PgApplicationRepository, PgAuditRepository, PgPermissionRepository, PgQuotaRepository,
  PgRefreshTokenRepository, PgRoleRepository, PgSsoSessionRepository, PgSubscriptionPlanRepository,
  PgUserRepository,
};
use crate::domains::audit::AuditService;
use crate::error::AppError;
use crate::services::collaborators::{LoggingNotificationSender, UnconfiguredOAuthProvider};

#[derive(Clone)]
pub struct AppState {
  inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
  config: AppConfig,
  db_pool: PgPool,
  redis: ConnectionManager,
  token_manager: TokenManager,
  permission_cache: DashMap<(UserId, String), (bool, Instant)>,
}

impl AppState {
  pub async fn try_new(config: AppConfig) -> anyhow::Result<Self> {
    let db_pool = sqlx::postgres::PgPoolOptions::new()
      .max_connections(config.database.max_connections)
      .connect(&config.database.url)
      .await?;

    let redis_client = redis::Client::open(config.cache.redis_url.as_str())?;
    let redis = ConnectionManager::new(redis_client).await?;

    let token_manager = TokenManager::from_config(&config.auth)?;

    Ok(Self {
      inner: Arc::new(AppStateInner {
        config,
        db_pool,
        redis,
        token_manager,
        permission_cache: DashMap::new(),
      }),
    })
  }

  pub fn config(&self) -> &AppConfig {
    &self.inner.config
  }

  pub fn redis(&self) -> ConnectionManager {
    self.inner.redis.clone()
  }

  pub fn cache_key_prefix(&self) -> &str {
    &self.inner.config.cache.key_prefix
  }

  // Repository constructors. `PgPool`/`ConnectionManager` are cheap to
  // clone (both are internally reference-counted), so each request
  // builds the narrow repository handles its domain services need
  // rather than `AppState` holding one instance of every repository
  // struct permanently.
  pub fn users(&self) -> PgUserRepository {
    PgUserRepository::new(self.inner.db_pool.clone())
  }

  pub fn refresh_tokens(&self) -> PgRefreshTokenRepository {
    PgRefreshTokenRepository::new(self.inner.db_pool.clone())
  }

  pub fn sso_sessions(&self) -> PgSsoSessionRepository {
    PgSsoSessionRepository::new(self.inner.db_pool.clone())
  }

  pub fn roles(&self) -> PgRoleRepository {
    PgRoleRepository::new(self.inner.db_pool.clone())
  }

  pub fn permissions(&self) -> PgPermissionRepository {
    PgPermissionRepository::new(self.inner.db_pool.clone())
  }

  pub fn applications(&self) -> PgApplicationRepository {
    PgApplicationRepository::new(self.inner.db_pool.clone())
  }

  pub fn subscription_plans(&self) -> PgSubscriptionPlanRepository {
    PgSubscriptionPlanRepository::new(self.inner.db_pool.clone())
  }

  pub fn quotas(&self) -> PgQuotaRepository {
    PgQuotaRepository::new(self.inner.db_pool.clone())
  }

  pub fn audit_service(&self) -> AuditService<PgAuditRepository> {
    AuditService::new(std::sync::Arc::new(PgAuditRepository::new(
      self.inner.db_pool.clone(),
    )))
  }

  pub fn cache_store(&self) -> RedisCacheStore {
    RedisCacheStore::new(self.inner.redis.clone(), self.inner.config.cache.key_prefix.clone())
  }

  pub fn notifications(&self) -> LoggingNotificationSender {
    LoggingNotificationSender
  }

  pub fn oauth_provider(&self) -> UnconfiguredOAuthProvider {
    UnconfiguredOAuthProvider
  }
}

impl std::ops::Deref for AppState {
  type Target = AppStateInner;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl std::fmt::Debug for AppStateInner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppStateInner")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl std::fmt::Debug for AppState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.inner.fmt(f)
  }
}

impl WithDbPool for AppState {
  fn db_pool(&self) -> &PgPool {
    &self.inner.db_pool
  }
}

impl WithTokenManager for AppState {
  fn token_manager(&self) -> &TokenManager {
    &self.inner.token_manager
  }
}

/// Short-TTL permission cache backing invariant 8 ("no stale `false`
/// after `assign_role`"). `assign_role` calls
/// [`WithCache::remove_from_cache`] for the affected user; nothing else
/// needs to be aware it exists.
impl WithCache<(UserId, String), bool> for AppState {
  fn get_from_cache(&self, key: &(UserId, String)) -> Option<bool> {
    let entry = self.inner.permission_cache.get(key)?;
    let (value, inserted_at) = *entry;
    if inserted_at.elapsed() > Duration::from_secs(30) {
      drop(entry);
      self.inner.permission_cache.remove(key);
      return None;
    }
    Some(value)
  }

  fn insert_into_cache(&self, key: (UserId, String), value: bool, ttl_seconds: u64) {
    let _ = ttl_seconds;
    self
      .inner
      .permission_cache
      .insert(key, (value, Instant::now()));
  }

  fn remove_from_cache(&self, key: &(UserId, String)) {
    self.inner.permission_cache.remove(key);
  }
}

impl AppState {
  /// Drops every cached permission decision for `user_id` — called after
  /// `assign_role`/`revoke_role` so invariant 8 holds without a global
  /// cache flush.
  pub fn invalidate_permission_cache_for_user(&self, user_id: UserId) {
    self
      .inner
      .permission_cache
      .retain(|(uid, _), _| *uid != user_id);
  }
}

impl crate::domains::authorization::PermissionCacheInvalidation for AppState {
  fn invalidate_user(&self, user_id: UserId) {
    self.invalidate_permission_cache_for_user(user_id);
  }
}

#[derive(Clone)]
pub struct AccessTokenClaims {
  pub user_id: UserId,
  pub app_id: AppId,
}

impl AppBoundClaims for AccessTokenClaims {
  fn user_id_string(&self) -> String {
    self.user_id.to_string()
  }

  fn app_id_string(&self) -> String {
    self.app_id.to_string()
  }
}

impl TokenVerifier for AppState {
  type Claims = AccessTokenClaims;
  type Error = CoreError;

  fn verify_token(&self, token: &str) -> Result<Self::Claims, Self::Error> {
    let claims = self.inner.token_manager.verify_access_token(token)?;
    Ok(AccessTokenClaims {
      user_id: claims.user_id()?,
      app_id: claims.app_id(),
    })
  }
}

/// Lets `iam_core::middlewares::verify_bearer_token_middleware` (which
/// cannot depend on `AppError`) render its rejection through the same
/// unified envelope every other middleware in this crate uses.
impl ErrorMapper for AppState {
  type Error = Response;

  fn map_error(error: CoreError) -> Response {
    AppError::Core(error).into_response()
  }
}

/// The identity attached to request extensions by the bearer-auth
/// middleware, read by handlers via `Extension<CallerIdentity>`.
#[derive(Clone, Debug)]
pub struct CallerIdentity {
  pub user_id: UserId,
  pub app_id: AppId,
}

impl From<AccessTokenClaims> for CallerIdentity {
  fn from(claims: AccessTokenClaims) -> Self {
    CallerIdentity {
      user_id: claims.user_id,
      app_id: claims.app_id,
    }
  }
}
