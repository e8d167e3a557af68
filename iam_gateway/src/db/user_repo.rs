use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iam_core::contracts::UserRepository;
use iam_core::error::CoreError;
use iam_core::models::{NewUser, User, UserId};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgUserRepository {
  pool: PgPool,
}

impl PgUserRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl UserRepository for PgUserRepository {
  async fn create(&self, input: &NewUser) -> Result<User, CoreError> {
    sqlx::query_as::<_, User>(
      r#"
      INSERT INTO users (username, email, phone, password_hash, status)
      VALUES ($1, $2, $3, $4, $5)
      RETURNING id, username, email, phone, password_hash, status,
                failed_login_attempts, locked_until, password_changed,
                last_login_at, created_at
      "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.password_hash)
    .bind(input.status)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn find_by_id(&self, id: UserId) -> Result<Option<User>, CoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn find_by_username(&self, username: &str) -> Result<Option<User>, CoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
      .bind(username)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
      .bind(email)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = $1")
      .bind(phone)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn activate(&self, id: UserId) -> Result<(), CoreError> {
    sqlx::query("UPDATE users SET status = 'active' WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Increments `failed_login_attempts`; once it reaches `lock_threshold`
  /// the user is locked for `lock_duration_secs` and the counter is left
  /// in place so the lockout is visible until it naturally expires.
  async fn record_failed_login(
    &self,
    id: UserId,
    lock_threshold: i32,
    lock_duration_secs: i64,
  ) -> Result<User, CoreError> {
    sqlx::query_as::<_, User>(
      r#"
      UPDATE users
      SET failed_login_attempts = failed_login_attempts + 1,
          status = CASE
            WHEN failed_login_attempts + 1 >= $2 THEN 'locked'::user_status
            ELSE status
          END,
          locked_until = CASE
            WHEN failed_login_attempts + 1 >= $2 THEN now() + make_interval(secs => $3)
            ELSE locked_until
          END
      WHERE id = $1
      RETURNING id, username, email, phone, password_hash, status,
                failed_login_attempts, locked_until, password_changed,
                last_login_at, created_at
      "#,
    )
    .bind(id)
    .bind(lock_threshold)
    .bind(lock_duration_secs as f64)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn record_successful_login(&self, id: UserId, now: DateTime<Utc>) -> Result<User, CoreError> {
    sqlx::query_as::<_, User>(
      r#"
      UPDATE users
      SET failed_login_attempts = 0,
          locked_until = NULL,
          status = CASE WHEN status = 'locked' THEN 'active'::user_status ELSE status END,
          last_login_at = $2
      WHERE id = $1
      RETURNING id, username, email, phone, password_hash, status,
                failed_login_attempts, locked_until, password_changed,
                last_login_at, created_at
      "#,
    )
    .bind(id)
    .bind(now)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn set_password(
    &self,
    id: UserId,
    password_hash: &str,
    password_changed: bool,
  ) -> Result<(), CoreError> {
    sqlx::query("UPDATE users SET password_hash = $1, password_changed = $2 WHERE id = $3")
      .bind(password_hash)
      .bind(password_changed)
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}
