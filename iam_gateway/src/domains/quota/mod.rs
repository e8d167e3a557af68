//! Quota accounter: per-application billing-cycle counters, atomic
//! reserve/commit/release, and rollover (spec §4.G).

use chrono::Utc;

use iam_core::contracts::{QuotaRepository, SubscriptionPlanRepository};
use iam_core::error::CoreError;
use iam_core::models::application::Application;
use iam_core::models::ids::AppId;
use iam_core::models::quota::{QuotaCounter, QuotaResetType, QuotaUsage, QuotaWarning};
use iam_core::models::subscription::SubscriptionPlan;

pub struct QuotaService<'a, Q, S> {
  pub quotas: &'a Q,
  pub plans: &'a S,
}

impl<'a, Q, S> QuotaService<'a, Q, S>
where
  Q: QuotaRepository,
  S: SubscriptionPlanRepository,
{
  pub fn new(quotas: &'a Q, plans: &'a S) -> Self {
    Self { quotas, plans }
  }

  /// Resolves the plan a quotaed operation against `app` needs. Fails
  /// `quota_not_configured` when the application has no bound plan
  /// (spec §7).
  pub async fn plan_for(&self, app: &Application) -> Result<SubscriptionPlan, CoreError> {
    let plan_id = app.subscription_plan_id.ok_or(CoreError::QuotaNotConfigured)?;
    self
      .plans
      .find_by_id(plan_id)
      .await?
      .ok_or(CoreError::QuotaNotConfigured)
  }

  /// Open/rollover step (spec §4.G step 1): fetches or creates the
  /// counter, emitting an auto snapshot and resetting it if the cycle has
  /// ended.
  pub async fn ensure_current_cycle(
    &self,
    app_id: AppId,
    plan: &SubscriptionPlan,
  ) -> Result<QuotaCounter, CoreError> {
    let now = Utc::now();
    let counter = self.quotas.get_or_create_counter(app_id, plan, now).await?;
    if counter.needs_rollover(now) {
      self.quotas.rollover(app_id, plan, now, QuotaResetType::Auto).await
    } else {
      Ok(counter)
    }
  }

  /// Reserve step for a non-LLM call: atomically increments
  /// `request_used` by 1, failing `request_quota_exceeded` without
  /// mutating the counter when the limit would be exceeded.
  pub async fn reserve_request(
    &self,
    app_id: AppId,
    plan: &SubscriptionPlan,
  ) -> Result<QuotaCounter, CoreError> {
    let counter = self.ensure_current_cycle(app_id, plan).await?;
    let limit = counter.effective_request_limit(plan.request_quota);
    self
      .quotas
      .try_reserve_request(app_id, limit)
      .await?
      .ok_or(CoreError::RequestQuotaExceeded)
  }

  /// Reserve step for an LLM call: reserves a request slot and an
  /// estimated token budget together (spec §4.G step 2).
  pub async fn reserve_request_and_tokens(
    &self,
    app_id: AppId,
    plan: &SubscriptionPlan,
    estimated_tokens: i64,
  ) -> Result<QuotaCounter, CoreError> {
    let after_request = self.reserve_request(app_id, plan).await?;
    let token_limit = after_request.effective_token_limit(plan.token_quota);
    match self
      .quotas
      .try_reserve_tokens(app_id, estimated_tokens, token_limit)
      .await?
    {
      Some(counter) => Ok(counter),
      None => {
        // Roll back the request slot the first half of this reservation
        // claimed, so a token-budget failure does not permanently consume
        // a request unit.
        self.quotas.release_request(app_id).await?;
        Err(CoreError::TokenQuotaExceeded)
      }
    }
  }

  /// Commit step, post-response, for LLM calls only: settles the
  /// reservation against the actual token count the upstream returned.
  pub async fn commit_tokens(&self, app_id: AppId, reserved: i64, actual: i64) -> Result<(), CoreError> {
    self.quotas.commit_tokens(app_id, reserved, actual).await
  }

  pub async fn usage(&self, app_id: AppId, plan: &SubscriptionPlan) -> Result<QuotaUsage, CoreError> {
    let counter = self.ensure_current_cycle(app_id, plan).await?;
    Ok(build_usage(&counter, plan))
  }


  pub async fn admin_override(
    &self,
    app_id: AppId,
    request_limit: Option<i64>,
    token_limit: Option<i64>,
  ) -> Result<(), CoreError> {
    self.quotas.set_overrides(app_id, request_limit, token_limit).await
  }

  /// Forces an immediate rollover, emitting a `manual` snapshot.
  pub async fn admin_reset(&self, app_id: AppId, plan: &SubscriptionPlan) -> Result<QuotaCounter, CoreError> {
    self
      .quotas
      .rollover(app_id, plan, Utc::now(), QuotaResetType::Manual)
      .await
  }
}

/// Picks the more severe of the request/token fraction warnings, for the
/// `X-Quota-Warning` header (spec §4.G).
pub fn warning_for(counter: &QuotaCounter, plan: &SubscriptionPlan) -> Option<QuotaWarning> {
  let request_fraction = QuotaCounter::usage_fraction(
    counter.request_used,
    counter.effective_request_limit(plan.request_quota),
  );
  let token_fraction = QuotaCounter::usage_fraction(
    counter.token_used,
    counter.effective_token_limit(plan.token_quota),
  );
  let request_warning = QuotaWarning::from_fraction(request_fraction);
  let token_warning = QuotaWarning::from_fraction(token_fraction);
  match (request_warning, token_warning) {
    (Some(QuotaWarning::Exhausted), _) | (_, Some(QuotaWarning::Exhausted)) => {
      Some(QuotaWarning::Exhausted)
    }
    (Some(w), _) | (_, Some(w)) => Some(w),
    _ => None,
  }
}

fn build_usage(counter: &QuotaCounter, plan: &SubscriptionPlan) -> QuotaUsage {
  let request_limit = counter.effective_request_limit(plan.request_quota);
  let token_limit = counter.effective_token_limit(plan.token_quota);
  QuotaUsage {
    request_quota_limit: request_limit,
    request_quota_used: counter.request_used,
    request_quota_remaining: counter.request_remaining(plan.request_quota).unwrap_or(-1),
    token_quota_limit: token_limit,
    token_quota_used: counter.token_used,
    token_quota_remaining: counter.token_remaining(plan.token_quota).unwrap_or(-1),
    billing_cycle_start: counter.cycle_start,
    billing_cycle_end: counter.cycle_end,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use chrono::{DateTime, Duration};
  use iam_core::models::ids::SubscriptionPlanId;
  use iam_core::models::subscription::UNLIMITED;

  use super::*;

  #[derive(Default)]
  struct FakeQuotas {
    counters: Mutex<Option<QuotaCounter>>,
  }

  #[async_trait]
  impl QuotaRepository for FakeQuotas {
    async fn get_or_create_counter(&self, app_id: AppId, plan: &SubscriptionPlan, now: DateTime<Utc>) -> Result<QuotaCounter, CoreError> {
      let mut counters = self.counters.lock().unwrap();
      if let Some(existing) = counters.as_ref() {
        return Ok(existing.clone());
      }
      let counter = QuotaCounter {
        app_id,
        cycle_start: now,
        cycle_end: now + Duration::days(plan.quota_period_days as i64),
        request_used: 0,
        token_used: 0,
        override_request_limit: None,
        override_token_limit: None,
      };
      *counters = Some(counter.clone());
      Ok(counter)
    }

    async fn try_reserve_request(&self, _app_id: AppId, limit: i64) -> Result<Option<QuotaCounter>, CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.as_mut().expect("counter must exist");
      if limit != UNLIMITED && counter.request_used + 1 > limit {
        return Ok(None);
      }
      counter.request_used += 1;
      Ok(Some(counter.clone()))
    }

    async fn try_reserve_tokens(&self, _app_id: AppId, estimated_tokens: i64, limit: i64) -> Result<Option<QuotaCounter>, CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.as_mut().expect("counter must exist");
      if limit != UNLIMITED && counter.token_used + estimated_tokens > limit {
        return Ok(None);
      }
      counter.token_used += estimated_tokens;
      Ok(Some(counter.clone()))
    }

    async fn release_request(&self, _app_id: AppId) -> Result<(), CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.as_mut().expect("counter must exist");
      counter.request_used -= 1;
      Ok(())
    }

    async fn commit_tokens(&self, _app_id: AppId, reserved: i64, actual: i64) -> Result<(), CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.as_mut().expect("counter must exist");
      counter.token_used = counter.token_used - reserved + actual;
      Ok(())
    }

    async fn release_tokens(&self, _app_id: AppId, amount: i64) -> Result<(), CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.as_mut().expect("counter must exist");
      counter.token_used -= amount;
      Ok(())
    }

    async fn rollover(&self, app_id: AppId, plan: &SubscriptionPlan, now: DateTime<Utc>, _reset_type: QuotaResetType) -> Result<QuotaCounter, CoreError> {
      let counter = QuotaCounter {
        app_id,
        cycle_start: now,
        cycle_end: now + Duration::days(plan.quota_period_days as i64),
        request_used: 0,
        token_used: 0,
        override_request_limit: None,
        override_token_limit: None,
      };
      *self.counters.lock().unwrap() = Some(counter.clone());
      Ok(counter)
    }

    async fn set_overrides(&self, _app_id: AppId, request_limit: Option<i64>, token_limit: Option<i64>) -> Result<(), CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.as_mut().expect("counter must exist");
      counter.override_request_limit = request_limit;
      counter.override_token_limit = token_limit;
      Ok(())
    }
  }

  #[derive(Default)]
  struct FakePlans {
    plan: Mutex<Option<SubscriptionPlan>>,
  }

  #[async_trait]
  impl SubscriptionPlanRepository for FakePlans {
    async fn find_by_id(&self, _id: SubscriptionPlanId) -> Result<Option<SubscriptionPlan>, CoreError> {
      Ok(self.plan.lock().unwrap().clone())
    }
  }

  fn test_plan(request_quota: i64, token_quota: i64) -> SubscriptionPlan {
    SubscriptionPlan {
      id: SubscriptionPlanId::new(1),
      name: "pro".to_string(),
      duration_days: 30,
      price: 0,
      request_quota,
      token_quota,
      quota_period_days: 30,
      is_active: true,
    }
  }

  #[tokio::test]
  async fn reserve_request_succeeds_until_limit_then_rejects() {
    let quotas = FakeQuotas::default();
    let plans = FakePlans::default();
    let service = QuotaService::new(&quotas, &plans);
    let app_id = AppId::new();
    let plan = test_plan(2, 1000);

    service.reserve_request(app_id, &plan).await.unwrap();
    service.reserve_request(app_id, &plan).await.unwrap();
    let rejected = service.reserve_request(app_id, &plan).await;
    assert!(matches!(rejected, Err(CoreError::RequestQuotaExceeded)));
  }

  #[tokio::test]
  async fn token_budget_rejection_releases_the_request_slot() {
    let quotas = FakeQuotas::default();
    let plans = FakePlans::default();
    let service = QuotaService::new(&quotas, &plans);
    let app_id = AppId::new();
    let plan = test_plan(10, 100);

    let rejected = service.reserve_request_and_tokens(app_id, &plan, 1000).await;
    assert!(matches!(rejected, Err(CoreError::TokenQuotaExceeded)));

    let usage = service.usage(app_id, &plan).await.unwrap();
    assert_eq!(usage.request_quota_used, 0);
  }

  #[tokio::test]
  async fn unlimited_plan_never_rejects() {
    let quotas = FakeQuotas::default();
    let plans = FakePlans::default();
    let service = QuotaService::new(&quotas, &plans);
    let app_id = AppId::new();
    let plan = test_plan(UNLIMITED, UNLIMITED);

    for _ in 0..50 {
      service.reserve_request(app_id, &plan).await.unwrap();
    }
  }

  #[tokio::test]
  async fn no_bound_plan_is_quota_not_configured() {
    let quotas = FakeQuotas::default();
    let plans = FakePlans::default();
    let service = QuotaService::new(&quotas, &plans);
    let app = iam_core::models::application::Application {
      app_id: AppId::new(),
      app_secret_hash: String::new(),
      webhook_secret: String::new(),
      name: "app".to_string(),
      status: iam_core::models::application::ApplicationStatus::Active,
      rate_limit: 60,
      subscription_plan_id: None,
      enabled_login_methods: vec![],
      oauth_credentials: Default::default(),
      granted_scopes: vec![],
      organization_ids: vec![],
      created_at: Utc::now(),
    };
    let result = service.plan_for(&app).await;
    assert!(matches!(result, Err(CoreError::QuotaNotConfigured)));
  }

  #[test]
  fn warning_for_picks_the_more_severe_of_request_and_token_fractions() {
    let plan = test_plan(100, 100);
    let counter = QuotaCounter {
      app_id: AppId::new(),
      cycle_start: Utc::now(),
      cycle_end: Utc::now() + Duration::days(30),
      request_used: 50,
      token_used: 100,
      override_request_limit: None,
      override_token_limit: None,
    };
    assert_eq!(warning_for(&counter, &plan), Some(QuotaWarning::Exhausted));
  }
}
