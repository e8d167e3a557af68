//! Identity lifecycle state machine: registration, login, lockout,
//! password change (spec §4.D).
//!
//! Generalizes the shape of `iam_core::services::token_domain`'s domain
//! service — a struct borrowing its repositories for the duration of a
//! request rather than owning them.

use chrono::Utc;
use rand::Rng;

use iam_core::contracts::{RefreshTokenRepository, SsoSessionRepository, UserRepository};
use iam_core::credentials::{check_password_strength, hash_password, verify_password};
use iam_core::error::CoreError;
use iam_core::models::{NewUser, User, UserId, UserStatus};
use iam_core::models::user::{BOOTSTRAP_SUPER_ADMIN_PASSWORD, BOOTSTRAP_SUPER_ADMIN_USERNAME};
use iam_core::services::TokenDomainService;

/// Outcome of a successful login: the resolved user plus whether the
/// client must be told to change their password before doing anything
/// else (spec §4.D's first-login rule).
pub struct LoginOutcome {
  pub user: User,
  pub requires_password_change: bool,
}

pub struct IdentityService<'a, U, R, S> {
  pub users: &'a U,
  pub token_domain: &'a TokenDomainService<'a, R, S>,
  pub lockout_threshold: i32,
  pub lockout_duration_secs: i64,
}

impl<'a, U, R, S> IdentityService<'a, U, R, S>
where
  U: UserRepository,
  R: RefreshTokenRepository,
  S: SsoSessionRepository,
{
  pub fn new(
    users: &'a U,
    token_domain: &'a TokenDomainService<'a, R, S>,
    lockout_threshold: i32,
    lockout_duration_secs: i64,
  ) -> Self {
    Self {
      users,
      token_domain,
      lockout_threshold,
      lockout_duration_secs,
    }
  }

  /// Creates an active user directly — used by the registration flow
  /// once the caller (a handler composing this with
  /// `domains::verification`) has already confirmed the verification
  /// code. Username defaults to a value derived from the contact point
  /// when the caller does not supply one, matching the wire protocol's
  /// `username?` optional field.
  pub async fn register(
    &self,
    username: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    password: &str,
  ) -> Result<User, CoreError> {
    check_password_strength(password)?;
    let password_hash = hash_password(password)?;
    let username = username.unwrap_or_else(|| default_username(email.as_deref(), phone.as_deref()));
    let input = NewUser {
      username,
      email,
      phone,
      password_hash,
      status: UserStatus::Active,
    };
    self.users.create(&input).await
  }

  /// Password login (spec §4.D). A missing identifier and a wrong
  /// password both surface `InvalidCredentials` — the state machine does
  /// not distinguish them to a caller, so a login attempt cannot be used
  /// to enumerate registered identifiers.
  pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, CoreError> {
    let user = self
      .users
      .find_by_identifier(identifier)
      .await?
      .ok_or(CoreError::InvalidCredentials)?;

    let now = Utc::now();
    if user.is_locked(now) {
      return Err(CoreError::AccountLocked);
    }

    if !verify_password(password, &user.password_hash)? {
      self
        .users
        .record_failed_login(user.id, self.lockout_threshold, self.lockout_duration_secs)
        .await?;
      return Err(CoreError::InvalidCredentials);
    }

    let user = self.users.record_successful_login(user.id, now).await?;
    Ok(LoginOutcome {
      requires_password_change: !user.password_changed,
      user,
    })
  }

  /// Code-based login (phone-code / email-code): the code itself is
  /// validated by `domains::verification` before this is called; this
  /// method only enforces the `status == active` precondition spec §4.D
  /// requires for code logins and performs the same counter reset a
  /// password login does.
  pub async fn login_with_verified_identity(&self, user: User) -> Result<LoginOutcome, CoreError> {
    if user.status != UserStatus::Active {
      return Err(CoreError::AccountNotActive);
    }
    let user = self.users.record_successful_login(user.id, Utc::now()).await?;
    Ok(LoginOutcome {
      requires_password_change: !user.password_changed,
      user,
    })
  }

  /// Changes a user's password, revoking every refresh token and SSO
  /// session for the account in the process (spec §4.D's first-login
  /// rule; SPEC_FULL.md Open Question 3 extends the same behavior to
  /// every password change, not only the first one).
  pub async fn change_password(
    &self,
    user_id: UserId,
    old_password: &str,
    new_password: &str,
  ) -> Result<(), CoreError> {
    let user = self
      .users
      .find_by_id(user_id)
      .await?
      .ok_or(CoreError::UserNotFound)?;
    if !verify_password(old_password, &user.password_hash)? {
      return Err(CoreError::InvalidCredentials);
    }
    check_password_strength(new_password)?;
    let new_hash = hash_password(new_password)?;
    self.users.set_password(user_id, &new_hash, true).await?;
    self.token_domain.revoke_all_for_user(user_id).await?;
    Ok(())
  }

  /// Seeds the platform's bootstrap super-admin account
  /// (`admin`/`123456`, `password_changed=false`) if it does not already
  /// exist. Idempotent — safe to call on every startup.
  pub async fn ensure_bootstrap_admin(&self) -> Result<User, CoreError> {
    if let Some(existing) = self.users.find_by_username(BOOTSTRAP_SUPER_ADMIN_USERNAME).await? {
      return Ok(existing);
    }
    let password_hash = hash_password(BOOTSTRAP_SUPER_ADMIN_PASSWORD)?;
    let input = NewUser {
      username: BOOTSTRAP_SUPER_ADMIN_USERNAME.to_string(),
      email: None,
      phone: None,
      password_hash,
      status: UserStatus::Active,
    };
    let user = self.users.create(&input).await?;
    self.users.set_password(user.id, &user.password_hash, false).await?;
    Ok(user)
  }
}

fn default_username(email: Option<&str>, phone: Option<&str>) -> String {
  let base = email
    .and_then(|e| e.split('@').next())
    .or(phone)
    .unwrap_or("user")
    .to_string();
  let suffix: u32 = rand::thread_rng().gen_range(1000..10_000);
  format!("{base}{suffix}")
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use iam_core::contracts::{RefreshTokenRepository, SsoSessionRepository};
  use iam_core::jwt::{TokenConfigProvider, TokenManager};
  use iam_core::models::token::{NewRefreshToken, RefreshToken, SsoSession};

  use super::*;

  #[test]
  fn default_username_derives_from_email_local_part() {
    let name = default_username(Some("alice@example.com"), None);
    assert!(name.starts_with("alice"));
    assert_eq!(name.len(), "alice".len() + 4);
  }

  #[test]
  fn default_username_falls_back_to_phone() {
    let name = default_username(None, Some("+15551234"));
    assert!(name.starts_with("+15551234"));
  }

  const TEST_SK: &str = include_str!("../../../../iam_core/testdata/test_rsa_private.pem");
  const TEST_PK: &str = include_str!("../../../../iam_core/testdata/test_rsa_public.pem");

  struct TestConfig;
  impl TokenConfigProvider for TestConfig {
    fn encoding_key_pem(&self) -> &str {
      TEST_SK
    }
    fn decoding_key_pem(&self) -> &str {
      TEST_PK
    }
  }

  #[derive(Default)]
  struct FakeUsers {
    rows: Mutex<Vec<User>>,
    next_id: Mutex<i64>,
  }

  #[async_trait]
  impl UserRepository for FakeUsers {
    async fn create(&self, input: &NewUser) -> Result<User, CoreError> {
      let mut next_id = self.next_id.lock().unwrap();
      *next_id += 1;
      let user = User {
        id: UserId::new(*next_id),
        username: input.username.clone(),
        email: input.email.clone(),
        phone: input.phone.clone(),
        password_hash: input.password_hash.clone(),
        status: input.status,
        failed_login_attempts: 0,
        locked_until: None,
        password_changed: true,
        last_login_at: None,
        created_at: Utc::now(),
      };
      self.rows.lock().unwrap().push(user.clone());
      Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|u| u.email.as_deref() == Some(email)).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|u| u.phone.as_deref() == Some(phone)).cloned())
    }

    async fn activate(&self, id: UserId) -> Result<(), CoreError> {
      if let Some(user) = self.rows.lock().unwrap().iter_mut().find(|u| u.id == id) {
        user.status = UserStatus::Active;
      }
      Ok(())
    }

    async fn record_failed_login(&self, id: UserId, lock_threshold: i32, lock_duration_secs: i64) -> Result<User, CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let user = rows.iter_mut().find(|u| u.id == id).ok_or(CoreError::UserNotFound)?;
      user.failed_login_attempts += 1;
      if user.failed_login_attempts >= lock_threshold {
        user.status = UserStatus::Locked;
        user.locked_until = Some(Utc::now() + chrono::Duration::seconds(lock_duration_secs));
      }
      Ok(user.clone())
    }

    async fn record_successful_login(&self, id: UserId, now: chrono::DateTime<Utc>) -> Result<User, CoreError> {
      let mut rows = self.rows.lock().unwrap();
      let user = rows.iter_mut().find(|u| u.id == id).ok_or(CoreError::UserNotFound)?;
      user.failed_login_attempts = 0;
      user.last_login_at = Some(now);
      Ok(user.clone())
    }

    async fn set_password(&self, id: UserId, password_hash: &str, password_changed: bool) -> Result<(), CoreError> {
      if let Some(user) = self.rows.lock().unwrap().iter_mut().find(|u| u.id == id) {
        user.password_hash = password_hash.to_string();
        user.password_changed = password_changed;
      }
      Ok(())
    }
  }

  #[derive(Default)]
  struct FakeRefreshTokens;

  #[async_trait]
  impl RefreshTokenRepository for FakeRefreshTokens {
    async fn create(&self, _input: NewRefreshToken) -> Result<RefreshToken, CoreError> {
      unreachable!("identity tests do not issue tokens")
    }
    async fn find_by_hash(&self, _token_hash: &str) -> Result<Option<RefreshToken>, CoreError> {
      Ok(None)
    }
    async fn revoke(&self, _id: iam_core::models::ids::RefreshTokenId) -> Result<(), CoreError> {
      Ok(())
    }
    async fn revoke_all_for_user(&self, _user_id: UserId) -> Result<(), CoreError> {
      Ok(())
    }
  }

  #[derive(Default)]
  struct FakeSsoSessions;

  #[async_trait]
  impl SsoSessionRepository for FakeSsoSessions {
    async fn create(&self, user_id: UserId, session_token_hash: String, expires_at: chrono::DateTime<Utc>) -> Result<SsoSession, CoreError> {
      Ok(SsoSession {
        id: 1,
        user_id,
        session_token_hash,
        expires_at,
        last_activity_at: Utc::now(),
      })
    }
    async fn find_by_hash(&self, _session_token_hash: &str) -> Result<Option<SsoSession>, CoreError> {
      Ok(None)
    }
    async fn bump_activity(&self, _id: i64, _now: chrono::DateTime<Utc>) -> Result<(), CoreError> {
      Ok(())
    }
    async fn delete(&self, _id: i64) -> Result<(), CoreError> {
      Ok(())
    }
    async fn delete_all_for_user(&self, _user_id: UserId) -> Result<(), CoreError> {
      Ok(())
    }
  }

  fn token_manager() -> TokenManager {
    TokenManager::from_config(&TestConfig).unwrap()
  }

  #[tokio::test]
  async fn register_then_login_succeeds_with_correct_password() {
    let users = FakeUsers::default();
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens;
    let sso_sessions = FakeSsoSessions;
    let token_domain = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let identity = IdentityService::new(&users, &token_domain, 5, 900);

    identity
      .register(Some("alice".to_string()), Some("alice@example.com".to_string()), None, "correct horse battery")
      .await
      .unwrap();

    let outcome = identity.login("alice", "correct horse battery").await.unwrap();
    assert_eq!(outcome.user.username, "alice");
    assert!(!outcome.requires_password_change);
  }

  #[tokio::test]
  async fn wrong_password_does_not_reveal_which_field_was_wrong() {
    let users = FakeUsers::default();
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens;
    let sso_sessions = FakeSsoSessions;
    let token_domain = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let identity = IdentityService::new(&users, &token_domain, 5, 900);
    identity
      .register(Some("bob".to_string()), Some("bob@example.com".to_string()), None, "correct horse battery")
      .await
      .unwrap();

    let unknown_user = identity.login("nobody", "whatever").await;
    let wrong_password = identity.login("bob", "whatever").await;
    assert!(matches!(unknown_user, Err(CoreError::InvalidCredentials)));
    assert!(matches!(wrong_password, Err(CoreError::InvalidCredentials)));
  }

  #[tokio::test]
  async fn repeated_failures_lock_the_account() {
    let users = FakeUsers::default();
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens;
    let sso_sessions = FakeSsoSessions;
    let token_domain = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let identity = IdentityService::new(&users, &token_domain, 3, 900);
    identity
      .register(Some("carol".to_string()), Some("carol@example.com".to_string()), None, "correct horse battery")
      .await
      .unwrap();

    for _ in 0..3 {
      let _ = identity.login("carol", "wrong password").await;
    }

    let attempt = identity.login("carol", "correct horse battery").await;
    assert!(matches!(attempt, Err(CoreError::AccountLocked)));
  }

  #[tokio::test]
  async fn change_password_requires_the_old_password() {
    let users = FakeUsers::default();
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens;
    let sso_sessions = FakeSsoSessions;
    let token_domain = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let identity = IdentityService::new(&users, &token_domain, 5, 900);
    let user = identity
      .register(Some("dave".to_string()), Some("dave@example.com".to_string()), None, "correct horse battery")
      .await
      .unwrap();

    let wrong_old = identity.change_password(user.id, "nope", "new password 123").await;
    assert!(matches!(wrong_old, Err(CoreError::InvalidCredentials)));

    identity
      .change_password(user.id, "correct horse battery", "new password 123")
      .await
      .unwrap();
    let login = identity.login("dave", "new password 123").await.unwrap();
    assert!(!login.requires_password_change);
  }
}
