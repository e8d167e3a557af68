//! Application registry: creation, update, secret rotation, and the
//! user-application binding that every gateway-created user receives
//! automatically (spec §4.F).

use std::collections::{HashMap, HashSet};

use iam_core::contracts::ApplicationRepository;
use iam_core::credentials::{generate_app_secrets, hash_app_secret, verify_app_secret};
use iam_core::error::CoreError;
use iam_core::models::application::{Application, ApplicationStatus, LoginMethod, OAuthCredential};
use iam_core::models::ids::{AppId, OrganizationId, SubscriptionPlanId, UserId};

/// An application's one-time secret, returned at creation and at
/// reset-secret time only — never persisted anywhere but the caller's
/// response.
pub struct IssuedSecret {
  pub app_id: AppId,
  pub app_secret: String,
}

pub struct NewApplicationInput {
  pub name: String,
  pub rate_limit: i32,
  pub enabled_login_methods: Vec<LoginMethod>,
  pub oauth_credentials: HashMap<String, OAuthCredential>,
  pub granted_scopes: Vec<String>,
  pub subscription_plan_id: Option<SubscriptionPlanId>,
  pub organization_ids: Vec<OrganizationId>,
}

pub struct ApplicationUpdateInput {
  pub name: String,
  pub status: ApplicationStatus,
  pub rate_limit: i32,
  pub enabled_login_methods: Vec<LoginMethod>,
  pub oauth_credentials: HashMap<String, OAuthCredential>,
  pub granted_scopes: Vec<String>,
  pub subscription_plan_id: Option<SubscriptionPlanId>,
  pub organization_ids: Vec<OrganizationId>,
}

pub struct ApplicationRegistryService<'a, AR> {
  pub applications: &'a AR,
}

impl<'a, AR> ApplicationRegistryService<'a, AR>
where
  AR: ApplicationRepository,
{
  pub fn new(applications: &'a AR) -> Self {
    Self { applications }
  }

  /// Allocates a new `app_id`, generates `app_secret`/`webhook_secret`,
  /// and persists only the secret's hash and the webhook secret's
  /// plaintext (spec §4.A). The plaintext `app_secret` is returned once.
  pub async fn create(&self, input: NewApplicationInput) -> Result<(Application, IssuedSecret), CoreError> {
    let secrets = generate_app_secrets();
    let app_secret_hash = hash_app_secret(&secrets.app_secret)?;
    let app = Application {
      app_id: AppId::new(),
      app_secret_hash,
      webhook_secret: secrets.webhook_secret,
      name: input.name,
      status: ApplicationStatus::Active,
      rate_limit: input.rate_limit,
      subscription_plan_id: input.subscription_plan_id,
      enabled_login_methods: input.enabled_login_methods,
      oauth_credentials: input.oauth_credentials,
      granted_scopes: input.granted_scopes,
      organization_ids: input.organization_ids,
      created_at: chrono::Utc::now(),
    };
    let created = self.applications.create(app).await?;
    let issued = IssuedSecret {
      app_id: created.app_id,
      app_secret: secrets.app_secret,
    };
    Ok((created, issued))
  }

  pub async fn update(&self, app_id: AppId, input: ApplicationUpdateInput) -> Result<Application, CoreError> {
    let existing = self.find_active_or_disabled(app_id).await?;
    let updated = Application {
      name: input.name,
      status: input.status,
      rate_limit: input.rate_limit,
      subscription_plan_id: input.subscription_plan_id,
      enabled_login_methods: input.enabled_login_methods,
      oauth_credentials: input.oauth_credentials,
      granted_scopes: input.granted_scopes,
      organization_ids: input.organization_ids,
      ..existing
    };
    self.applications.update(updated).await
  }

  /// Regenerates `app_secret`, invalidating the old hash. `webhook_secret`
  /// is untouched (spec §4.F only mentions `app_secret` rotation).
  pub async fn reset_secret(&self, app_id: AppId) -> Result<IssuedSecret, CoreError> {
    self.find_active_or_disabled(app_id).await?;
    let secrets = generate_app_secrets();
    let hash = hash_app_secret(&secrets.app_secret)?;
    self.applications.set_app_secret_hash(app_id, &hash).await?;
    Ok(IssuedSecret {
      app_id,
      app_secret: secrets.app_secret,
    })
  }

  pub async fn delete(&self, app_id: AppId) -> Result<(), CoreError> {
    self.applications.delete(app_id).await
  }

  pub async fn find(&self, app_id: AppId) -> Result<Application, CoreError> {
    self.find_active_or_disabled(app_id).await
  }

  /// Verifies `X-App-Id` + `X-App-Secret` against the stored hash
  /// (pipeline step 1's app-credential branch, spec §4.H). Constant-time
  /// with respect to the candidate secret because `verify_app_secret`
  /// delegates to Argon2 verification.
  pub async fn verify_credentials(&self, app_id: AppId, app_secret: &str) -> Result<Application, CoreError> {
    let app = self
      .applications
      .find_by_id(app_id)
      .await?
      .ok_or(CoreError::InvalidCredentials)?;
    if !verify_app_secret(app_secret, &app.app_secret_hash)? {
      return Err(CoreError::InvalidCredentials);
    }
    if app.status != ApplicationStatus::Active {
      return Err(CoreError::AppDisabled);
    }
    Ok(app)
  }

  /// Binds `user_id` to `app_id` — every user created through a
  /// gateway-scoped registration endpoint is automatically bound to the
  /// application it registered through (spec §4.F).
  pub async fn bind_user(&self, app_id: AppId, user_id: UserId) -> Result<(), CoreError> {
    self.applications.bind_user(app_id, user_id).await
  }

  pub async fn is_user_bound(&self, app_id: AppId, user_id: UserId) -> Result<bool, CoreError> {
    self.applications.is_user_bound(app_id, user_id).await
  }

  pub fn has_login_method(app: &Application, method: LoginMethod) -> bool {
    app.has_login_method(method)
  }

  pub fn has_scope(app: &Application, scope: &str) -> bool {
    app.has_scope(scope)
  }

  pub fn granted_scope_set(app: &Application) -> HashSet<&str> {
    app.granted_scope_set()
  }

  async fn find_active_or_disabled(&self, app_id: AppId) -> Result<Application, CoreError> {
    self
      .applications
      .find_by_id(app_id)
      .await?
      .ok_or(CoreError::InvalidCredentials)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;

  #[derive(Default)]
  struct FakeApplications {
    rows: Mutex<Vec<Application>>,
    bindings: Mutex<HashSet<(AppId, UserId)>>,
  }

  #[async_trait]
  impl ApplicationRepository for FakeApplications {
    async fn create(&self, app: Application) -> Result<Application, CoreError> {
      self.rows.lock().unwrap().push(app.clone());
      Ok(app)
    }
    async fn find_by_id(&self, app_id: AppId) -> Result<Option<Application>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|a| a.app_id == app_id).cloned())
    }
    async fn update(&self, app: Application) -> Result<Application, CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let existing = rows.iter_mut().find(|a| a.app_id == app.app_id).ok_or(CoreError::InvalidCredentials)?;
      *existing = app.clone();
      Ok(app)
    }
    async fn delete(&self, app_id: AppId) -> Result<(), CoreError> {
      self.rows.lock().unwrap().retain(|a| a.app_id != app_id);
      Ok(())
    }
    async fn set_app_secret_hash(&self, app_id: AppId, hash: &str) -> Result<(), CoreError> {
      if let Some(app) = self.rows.lock().unwrap().iter_mut().find(|a| a.app_id == app_id) {
        app.app_secret_hash = hash.to_string();
      }
      Ok(())
    }
    async fn bind_user(&self, app_id: AppId, user_id: UserId) -> Result<(), CoreError> {
      self.bindings.lock().unwrap().insert((app_id, user_id));
      Ok(())
    }
    async fn is_user_bound(&self, app_id: AppId, user_id: UserId) -> Result<bool, CoreError> {
      Ok(self.bindings.lock().unwrap().contains(&(app_id, user_id)))
    }
  }

  fn new_app_input() -> NewApplicationInput {
    NewApplicationInput {
      name: "demo".to_string(),
      rate_limit: 60,
      enabled_login_methods: vec![LoginMethod::Email],
      oauth_credentials: HashMap::new(),
      granted_scopes: vec!["auth:login".to_string()],
      subscription_plan_id: None,
      organization_ids: vec![],
    }
  }

  #[tokio::test]
  async fn create_returns_the_plaintext_secret_exactly_once() {
    let applications = FakeApplications::default();
    let service = ApplicationRegistryService::new(&applications);

    let (app, issued) = service.create(new_app_input()).await.unwrap();
    assert_eq!(issued.app_id, app.app_id);
    assert_ne!(app.app_secret_hash, issued.app_secret);
    assert!(verify_app_secret(&issued.app_secret, &app.app_secret_hash).unwrap());
  }

  #[tokio::test]
  async fn verify_credentials_rejects_wrong_secret_and_disabled_app() {
    let applications = FakeApplications::default();
    let service = ApplicationRegistryService::new(&applications);
    let (app, issued) = service.create(new_app_input()).await.unwrap();

    let wrong = service.verify_credentials(app.app_id, "not-the-secret").await;
    assert!(matches!(wrong, Err(CoreError::InvalidCredentials)));

    service
      .update(app.app_id, ApplicationUpdateInput {
        name: app.name.clone(),
        status: ApplicationStatus::Disabled,
        rate_limit: app.rate_limit,
        enabled_login_methods: app.enabled_login_methods.clone(),
        oauth_credentials: app.oauth_credentials.clone(),
        granted_scopes: app.granted_scopes.clone(),
        subscription_plan_id: app.subscription_plan_id,
        organization_ids: app.organization_ids.clone(),
      })
      .await
      .unwrap();

    let disabled = service.verify_credentials(app.app_id, &issued.app_secret).await;
    assert!(matches!(disabled, Err(CoreError::AppDisabled)));
  }

  #[tokio::test]
  async fn reset_secret_invalidates_the_previous_one() {
    let applications = FakeApplications::default();
    let service = ApplicationRegistryService::new(&applications);
    let (app, original) = service.create(new_app_input()).await.unwrap();

    let rotated = service.reset_secret(app.app_id).await.unwrap();
    assert_ne!(rotated.app_secret, original.app_secret);

    let old_secret_fails = service.verify_credentials(app.app_id, &original.app_secret).await;
    assert!(matches!(old_secret_fails, Err(CoreError::InvalidCredentials)));
    service.verify_credentials(app.app_id, &rotated.app_secret).await.unwrap();
  }

  #[tokio::test]
  async fn bind_user_is_idempotent_and_queryable() {
    let applications = FakeApplications::default();
    let service = ApplicationRegistryService::new(&applications);
    let (app, _) = service.create(new_app_input()).await.unwrap();
    let user_id = UserId::new(1);

    assert!(!service.is_user_bound(app.app_id, user_id).await.unwrap());
    service.bind_user(app.app_id, user_id).await.unwrap();
    service.bind_user(app.app_id, user_id).await.unwrap();
    assert!(service.is_user_bound(app.app_id, user_id).await.unwrap());
  }
}
