use async_trait::async_trait;
use iam_core::contracts::SubscriptionPlanRepository;
use iam_core::error::CoreError;
use iam_core::models::{SubscriptionPlan, SubscriptionPlanId};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgSubscriptionPlanRepository {
  pool: PgPool,
}

impl PgSubscriptionPlanRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl SubscriptionPlanRepository for PgSubscriptionPlanRepository {
  async fn find_by_id(&self, id: SubscriptionPlanId) -> Result<Option<SubscriptionPlan>, CoreError> {
    sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(CoreError::from)
  }
}
