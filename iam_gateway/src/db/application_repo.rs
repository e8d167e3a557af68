use async_trait::async_trait;
use iam_core::contracts::ApplicationRepository;
use iam_core::error::CoreError;
use iam_core::models::{AppId, Application, UserId};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgApplicationRepository {
  pool: PgPool,
}

impl PgApplicationRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
  async fn create(&self, app: Application) -> Result<Application, CoreError> {
    sqlx::query_as::<_, Application>(
      r#"
      INSERT INTO applications (
        app_id, app_secret_hash, webhook_secret, name, status, rate_limit,
        subscription_plan_id, enabled_login_methods, oauth_credentials,
        granted_scopes, organization_ids
      )
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
      RETURNING app_id, app_secret_hash, webhook_secret, name, status, rate_limit,
                subscription_plan_id, enabled_login_methods, oauth_credentials,
                granted_scopes, organization_ids, created_at
      "#,
    )
    .bind(app.app_id)
    .bind(&app.app_secret_hash)
    .bind(&app.webhook_secret)
    .bind(&app.name)
    .bind(app.status)
    .bind(app.rate_limit)
    .bind(app.subscription_plan_id)
    .bind(sqlx::types::Json(&app.enabled_login_methods))
    .bind(sqlx::types::Json(&app.oauth_credentials))
    .bind(sqlx::types::Json(&app.granted_scopes))
    .bind(sqlx::types::Json(&app.organization_ids))
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn find_by_id(&self, app_id: AppId) -> Result<Option<Application>, CoreError> {
    sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE app_id = $1")
      .bind(app_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn update(&self, app: Application) -> Result<Application, CoreError> {
    sqlx::query_as::<_, Application>(
      r#"
      UPDATE applications
      SET name = $2, status = $3, rate_limit = $4, subscription_plan_id = $5,
          enabled_login_methods = $6, oauth_credentials = $7, granted_scopes = $8,
          organization_ids = $9
      WHERE app_id = $1
      RETURNING app_id, app_secret_hash, webhook_secret, name, status, rate_limit,
                subscription_plan_id, enabled_login_methods, oauth_credentials,
                granted_scopes, organization_ids, created_at
      "#,
    )
    .bind(app.app_id)
    .bind(&app.name)
    .bind(app.status)
    .bind(app.rate_limit)
    .bind(app.subscription_plan_id)
    .bind(sqlx::types::Json(&app.enabled_login_methods))
    .bind(sqlx::types::Json(&app.oauth_credentials))
    .bind(sqlx::types::Json(&app.granted_scopes))
    .bind(sqlx::types::Json(&app.organization_ids))
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn delete(&self, app_id: AppId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM applications WHERE app_id = $1")
      .bind(app_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn set_app_secret_hash(&self, app_id: AppId, hash: &str) -> Result<(), CoreError> {
    sqlx::query("UPDATE applications SET app_secret_hash = $1 WHERE app_id = $2")
      .bind(hash)
      .bind(app_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn bind_user(&self, app_id: AppId, user_id: UserId) -> Result<(), CoreError> {
    sqlx::query(
      "INSERT INTO user_applications (user_id, app_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(app_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn is_user_bound(&self, app_id: AppId, user_id: UserId) -> Result<bool, CoreError> {
    let (exists,): (bool,) = sqlx::query_as(
      "SELECT EXISTS(SELECT 1 FROM user_applications WHERE app_id = $1 AND user_id = $2)",
    )
    .bind(app_id)
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(exists)
  }
}
