use async_trait::async_trait;
use iam_core::contracts::{PermissionRepository, RoleRepository};
use iam_core::error::CoreError;
use iam_core::models::{Permission, PermissionId, Role, RoleId, UserId};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgRoleRepository {
  pool: PgPool,
}

impl PgRoleRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
  async fn create(&self, name: &str, description: &str) -> Result<Role, CoreError> {
    sqlx::query_as::<_, Role>(
      "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id, name, description, is_system_role",
    )
    .bind(name)
    .bind(description)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn find_by_id(&self, id: RoleId) -> Result<Option<Role>, CoreError> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn find_by_name(&self, name: &str) -> Result<Option<Role>, CoreError> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
      .bind(name)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn delete(&self, id: RoleId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM roles WHERE id = $1 AND is_system_role = FALSE")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn assign_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), CoreError> {
    sqlx::query(
      "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(role_id)
    .bind(permission_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn remove_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
      .bind(role_id)
      .bind(permission_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn permission_ids_for_role(&self, role_id: RoleId) -> Result<Vec<PermissionId>, CoreError> {
    let rows: Vec<(PermissionId,)> =
      sqlx::query_as("SELECT permission_id FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
  }

  async fn user_ids_holding_role(&self, role_id: RoleId) -> Result<Vec<UserId>, CoreError> {
    let rows: Vec<(UserId,)> = sqlx::query_as("SELECT user_id FROM user_roles WHERE role_id = $1")
      .bind(role_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
  }

  async fn assign_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<bool, CoreError> {
    let result = sqlx::query(
      "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn remove_from_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
      .bind(user_id)
      .bind(role_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn role_ids_for_user(&self, user_id: UserId) -> Result<Vec<RoleId>, CoreError> {
    let rows: Vec<(RoleId,)> = sqlx::query_as("SELECT role_id FROM user_roles WHERE user_id = $1")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
  }
}

#[derive(Clone)]
pub struct PgPermissionRepository {
  pool: PgPool,
}

impl PgPermissionRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
  async fn create(&self, resource: &str, action: &str) -> Result<Permission, CoreError> {
    let name = Permission::qualified_name(resource, action);
    sqlx::query_as::<_, Permission>(
      "INSERT INTO permissions (name, resource, action) VALUES ($1, $2, $3) RETURNING id, name, resource, action",
    )
    .bind(&name)
    .bind(resource)
    .bind(action)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn find_by_id(&self, id: PermissionId) -> Result<Option<Permission>, CoreError> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn find_by_name(&self, name: &str) -> Result<Option<Permission>, CoreError> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE name = $1")
      .bind(name)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }

  async fn delete(&self, id: PermissionId) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM permissions WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn is_referenced_by_any_role(&self, id: PermissionId) -> Result<bool, CoreError> {
    let (exists,): (bool,) =
      sqlx::query_as("SELECT EXISTS(SELECT 1 FROM role_permissions WHERE permission_id = $1)")
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
    Ok(exists)
  }

  async fn names_for_ids(&self, ids: &[PermissionId]) -> Result<Vec<String>, CoreError> {
    let raw_ids: Vec<i64> = ids.iter().map(|id| id.inner()).collect();
    let rows: Vec<(String,)> =
      sqlx::query_as("SELECT name FROM permissions WHERE id = ANY($1)")
        .bind(&raw_ids)
        .fetch_all(&self.pool)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
  }

  async fn user_ids_transitively_holding(&self, id: PermissionId) -> Result<Vec<UserId>, CoreError> {
    let rows: Vec<(UserId,)> = sqlx::query_as(
      r#"
      SELECT DISTINCT ur.user_id
      FROM user_roles ur
      JOIN role_permissions rp ON rp.role_id = ur.role_id
      WHERE rp.permission_id = $1
      "#,
    )
    .bind(id)
    .fetch_all(&self.pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
  }
}
