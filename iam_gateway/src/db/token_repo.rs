use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iam_core::contracts::{RefreshTokenRepository, SsoSessionRepository};
use iam_core::error::CoreError;
use iam_core::models::{NewRefreshToken, RefreshToken, RefreshTokenId, SsoSession, UserId};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgRefreshTokenRepository {
  pool: PgPool,
}

impl PgRefreshTokenRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
  async fn create(&self, input: NewRefreshToken) -> Result<RefreshToken, CoreError> {
    sqlx::query_as::<_, RefreshToken>(
      r#"
      INSERT INTO refresh_tokens (user_id, token_hash, app_id, expires_at)
      VALUES ($1, $2, $3, $4)
      RETURNING id, user_id, token_hash, app_id, expires_at, revoked, revoked_at, issued_at
      "#,
    )
    .bind(input.user_id)
    .bind(&input.token_hash)
    .bind(input.app_id)
    .bind(input.expires_at)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, CoreError> {
    sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
      .bind(token_hash)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn revoke(&self, id: RefreshTokenId) -> Result<(), CoreError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn revoke_all_for_user(&self, user_id: UserId) -> Result<(), CoreError> {
    sqlx::query(
      "UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() WHERE user_id = $1 AND revoked = FALSE",
    )
    .bind(user_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}

#[derive(Clone)]
pub struct PgSsoSessionRepository {
  pool: PgPool,
}

impl PgSsoSessionRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl SsoSessionRepository for PgSsoSessionRepository {
  async fn create(
    &self,
    user_id: UserId,
    session_token_hash: String,
    expires_at: DateTime<Utc>,
  ) -> Result<SsoSession, CoreError> {
    sqlx::query_as::<_, SsoSession>(
      r#"
      INSERT INTO sso_sessions (user_id, session_token_hash, expires_at)
      VALUES ($1, $2, $3)
      RETURNING id, user_id, session_token_hash, expires_at, last_activity_at
      "#,
    )
    .bind(user_id)
    .bind(session_token_hash)
    .bind(expires_at)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn find_by_hash(&self, session_token_hash: &str) -> Result<Option<SsoSession>, CoreError> {
    sqlx::query_as::<_, SsoSession>("SELECT * FROM sso_sessions WHERE session_token_hash = $1")
      .bind(session_token_hash)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn bump_activity(&self, id: i64, now: DateTime<Utc>) -> Result<(), CoreError> {
    sqlx::query("UPDATE sso_sessions SET last_activity_at = $2 WHERE id = $1")
      .bind(id)
      .bind(now)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn delete(&self, id: i64) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM sso_sessions WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn delete_all_for_user(&self, user_id: UserId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM sso_sessions WHERE user_id = $1")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}
