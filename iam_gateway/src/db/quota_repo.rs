use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use iam_core::contracts::QuotaRepository;
use iam_core::error::CoreError;
use iam_core::models::{AppId, QuotaCounter, QuotaResetType, SubscriptionPlan};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgQuotaRepository {
  pool: PgPool,
}

impl PgQuotaRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl QuotaRepository for PgQuotaRepository {
  async fn get_or_create_counter(
    &self,
    app_id: AppId,
    plan: &SubscriptionPlan,
    now: DateTime<Utc>,
  ) -> Result<QuotaCounter, CoreError> {
    if let Some(counter) =
      sqlx::query_as::<_, QuotaCounter>("SELECT * FROM quota_counters WHERE app_id = $1")
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?
    {
      return Ok(counter);
    }
    let cycle_end = now + Duration::days(plan.quota_period_days as i64);
    sqlx::query_as::<_, QuotaCounter>(
      r#"
      INSERT INTO quota_counters (app_id, cycle_start, cycle_end, request_used, token_used)
      VALUES ($1, $2, $3, 0, 0)
      ON CONFLICT (app_id) DO UPDATE SET app_id = quota_counters.app_id
      RETURNING *
      "#,
    )
    .bind(app_id)
    .bind(now)
    .bind(cycle_end)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  /// Invariant 9: a single row-locked `UPDATE ... RETURNING` so
  /// concurrent reservations against the same counter serialize on the
  /// row lock rather than racing a read-then-write.
  async fn try_reserve_request(&self, app_id: AppId, limit: i64) -> Result<Option<QuotaCounter>, CoreError> {
    sqlx::query_as::<_, QuotaCounter>(
      r#"
      UPDATE quota_counters
      SET request_used = request_used + 1
      WHERE app_id = $1 AND ($2 = -1 OR request_used < $2)
      RETURNING *
      "#,
    )
    .bind(app_id)
    .bind(limit)
    .fetch_optional(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn try_reserve_tokens(
    &self,
    app_id: AppId,
    estimated_tokens: i64,
    limit: i64,
  ) -> Result<Option<QuotaCounter>, CoreError> {
    sqlx::query_as::<_, QuotaCounter>(
      r#"
      UPDATE quota_counters
      SET token_used = token_used + $3
      WHERE app_id = $1 AND ($2 = -1 OR token_used + $3 <= $2)
      RETURNING *
      "#,
    )
    .bind(app_id)
    .bind(limit)
    .bind(estimated_tokens)
    .fetch_optional(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn release_request(&self, app_id: AppId) -> Result<(), CoreError> {
    sqlx::query("UPDATE quota_counters SET request_used = GREATEST(request_used - 1, 0) WHERE app_id = $1")
      .bind(app_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Settles a token reservation against the actual count reported by the
  /// downstream subsystem, per the Open Question resolution: an absent
  /// `actual` is treated as equal to `reserved` (no-op delta).
  async fn commit_tokens(&self, app_id: AppId, reserved: i64, actual: i64) -> Result<(), CoreError> {
    let delta = actual - reserved;
    if delta == 0 {
      return Ok(());
    }
    sqlx::query("UPDATE quota_counters SET token_used = GREATEST(token_used + $2, 0) WHERE app_id = $1")
      .bind(app_id)
      .bind(delta)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn release_tokens(&self, app_id: AppId, amount: i64) -> Result<(), CoreError> {
    sqlx::query(
      "UPDATE quota_counters SET token_used = GREATEST(token_used - $2, 0) WHERE app_id = $1",
    )
    .bind(app_id)
    .bind(amount)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn rollover(
    &self,
    app_id: AppId,
    plan: &SubscriptionPlan,
    now: DateTime<Utc>,
    reset_type: QuotaResetType,
  ) -> Result<QuotaCounter, CoreError> {
    let existing = sqlx::query_as::<_, QuotaCounter>("SELECT * FROM quota_counters WHERE app_id = $1 FOR UPDATE")
      .bind(app_id)
      .fetch_optional(&self.pool)
      .await?;

    if let Some(existing) = &existing {
      sqlx::query(
        r#"
        INSERT INTO quota_snapshots (
          app_id, cycle_start, cycle_end, request_limit, request_used,
          token_limit, token_used, reset_type
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
      )
      .bind(app_id)
      .bind(existing.cycle_start)
      .bind(existing.cycle_end)
      .bind(existing.effective_request_limit(plan.request_quota))
      .bind(existing.request_used)
      .bind(existing.effective_token_limit(plan.token_quota))
      .bind(existing.token_used)
      .bind(reset_type)
      .execute(&self.pool)
      .await?;
    }

    let cycle_start = existing.as_ref().map(|e| e.cycle_end).unwrap_or(now);
    let cycle_end = cycle_start + Duration::days(plan.quota_period_days as i64);
    sqlx::query_as::<_, QuotaCounter>(
      r#"
      INSERT INTO quota_counters (app_id, cycle_start, cycle_end, request_used, token_used)
      VALUES ($1, $2, $3, 0, 0)
      ON CONFLICT (app_id) DO UPDATE SET
        cycle_start = EXCLUDED.cycle_start,
        cycle_end = EXCLUDED.cycle_end,
        request_used = 0,
        token_used = 0
      RETURNING *
      "#,
    )
    .bind(app_id)
    .bind(cycle_start)
    .bind(cycle_end)
    .fetch_one(&self.pool)
    .await
    .map_err(CoreError::from)
  }

  async fn set_overrides(
    &self,
    app_id: AppId,
    request_limit: Option<i64>,
    token_limit: Option<i64>,
  ) -> Result<(), CoreError> {
    sqlx::query(
      "UPDATE quota_counters SET override_request_limit = $2, override_token_limit = $3 WHERE app_id = $1",
    )
    .bind(app_id)
    .bind(request_limit)
    .bind(token_limit)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}
