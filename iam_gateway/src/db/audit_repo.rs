use async_trait::async_trait;
use iam_core::contracts::AuditRepository;
use iam_core::error::CoreError;
use iam_core::models::NewAuditEntry;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgAuditRepository {
  pool: PgPool,
}

impl PgAuditRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
  /// Never propagates a failure as the caller's result (spec §7's
  /// propagation policy) — callers that want that guarantee should spawn
  /// this behind `tokio::spawn` rather than awaiting it inline; this
  /// method itself still surfaces the `sqlx::Error` so a caller that does
  /// await it inline (e.g. a test) can observe a broken audit sink.
  async fn append(&self, entry: NewAuditEntry) -> Result<(), CoreError> {
    sqlx::query(
      r#"
      INSERT INTO audit_entries (user_id, action, resource_type, resource_id, details, ip_address, user_agent)
      VALUES ($1, $2, $3, $4, $5, $6, $7)
      "#,
    )
    .bind(entry.user_id)
    .bind(&entry.action)
    .bind(&entry.resource_type)
    .bind(&entry.resource_id)
    .bind(&entry.details)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}
