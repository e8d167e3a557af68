//! Token-service domain logic (spec §4.B): issuing, rotating, and
//! revoking refresh tokens; SSO session lifecycle.
//!
//! Generalizes the teacher's `CoreAuthService` refresh/rotate shape
//! (expiry, revoked, app/context checks) and adds the reuse-detection
//! behavior spec invariant 3 requires, which the teacher does not
//! implement: a second use of an already-rotated refresh token revokes
//! every sibling token belonging to that user.

use chrono::{Duration, Utc};

use crate::contracts::{RefreshTokenRepository, SsoSessionRepository};
use crate::error::CoreError;
use crate::jwt::{
  self, REFRESH_TOKEN_TTL_SECS, SSO_SESSION_TTL_SECS, TokenManager,
};
use crate::models::ids::{AppId, UserId};
use crate::models::token::{IssuedTokens, NewRefreshToken};

pub struct TokenDomainService<'a, R, S> {
  pub token_manager: &'a TokenManager,
  pub refresh_tokens: &'a R,
  pub sso_sessions: &'a S,
}

impl<'a, R, S> TokenDomainService<'a, R, S>
where
  R: RefreshTokenRepository,
  S: SsoSessionRepository,
{
  pub fn new(token_manager: &'a TokenManager, refresh_tokens: &'a R, sso_sessions: &'a S) -> Self {
    Self {
      token_manager,
      refresh_tokens,
      sso_sessions,
    }
  }

  /// Issues a fresh access token, refresh token, and SSO session for
  /// `(user_id, app_id)`.
  pub async fn issue_pair(&self, user_id: UserId, app_id: AppId) -> Result<IssuedTokens, CoreError> {
    let access_token = self.token_manager.issue_access_token(user_id, app_id)?;

    let refresh_token = jwt::generate_refresh_token();
    let refresh_hash = jwt::sha256_hash(&refresh_token);
    self
      .refresh_tokens
      .create(NewRefreshToken {
        user_id,
        token_hash: refresh_hash,
        app_id: Some(app_id),
        expires_at: Utc::now() + Duration::seconds(REFRESH_TOKEN_TTL_SECS),
      })
      .await?;

    let sso_session_token = jwt::generate_sso_session_token();
    let sso_hash = jwt::sha256_hash(&sso_session_token);
    self
      .sso_sessions
      .create(
        user_id,
        sso_hash,
        Utc::now() + Duration::seconds(SSO_SESSION_TTL_SECS),
      )
      .await?;

    Ok(IssuedTokens {
      access_token,
      refresh_token,
      sso_session_token,
      expires_in: jwt::ACCESS_TOKEN_TTL_SECS,
    })
  }

  /// Validates and rotates a refresh token (spec §4.B / invariant 3).
  ///
  /// Rejects if the token is absent, revoked, expired, or bound to a
  /// different `app_id`. A revoked-but-otherwise-well-formed hit (the
  /// token was already consumed once) is treated as reuse of a rotated
  /// token: every refresh token for that user is revoked before the
  /// error is returned, so a stolen-and-replayed token cannot be used
  /// again even if the attacker races the legitimate client.
  pub async fn refresh(&self, refresh_token: &str, app_id: AppId) -> Result<IssuedTokens, CoreError> {
    let hash = jwt::sha256_hash(refresh_token);
    let record = self
      .refresh_tokens
      .find_by_hash(&hash)
      .await?
      .ok_or(CoreError::InvalidToken)?;

    if record.app_id != Some(app_id) {
      return Err(CoreError::InvalidToken);
    }

    if record.revoked {
      self.refresh_tokens.revoke_all_for_user(record.user_id).await?;
      return Err(CoreError::InvalidToken);
    }

    if !record.is_usable(Utc::now()) {
      return Err(CoreError::TokenExpired);
    }

    self.refresh_tokens.revoke(record.id).await?;
    self.issue_pair(record.user_id, app_id).await
  }

  pub async fn logout(&self, refresh_token: &str) -> Result<(), CoreError> {
    let hash = jwt::sha256_hash(refresh_token);
    if let Some(record) = self.refresh_tokens.find_by_hash(&hash).await? {
      self.refresh_tokens.revoke(record.id).await?;
    }
    Ok(())
  }

  /// Called on password change and admin revocation (spec §4.B). Also
  /// terminates SSO sessions, per the Open Question resolution recorded
  /// in SPEC_FULL.md.
  pub async fn revoke_all_for_user(&self, user_id: UserId) -> Result<(), CoreError> {
    self.refresh_tokens.revoke_all_for_user(user_id).await?;
    self.sso_sessions.delete_all_for_user(user_id).await?;
    Ok(())
  }

  pub async fn validate_sso_session(&self, session_token: &str) -> Result<Option<UserId>, CoreError> {
    let hash = jwt::sha256_hash(session_token);
    let Some(session) = self.sso_sessions.find_by_hash(&hash).await? else {
      return Ok(None);
    };
    if jwt::is_expired(session.expires_at) {
      self.sso_sessions.delete(session.id).await?;
      return Ok(None);
    }
    self.sso_sessions.bump_activity(session.id, Utc::now()).await?;
    Ok(Some(session.user_id))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;
  use crate::jwt::TokenConfigProvider;
  use crate::models::ids::RefreshTokenId;

  const TEST_SK: &str = include_str!("../../testdata/test_rsa_private.pem");
  const TEST_PK: &str = include_str!("../../testdata/test_rsa_public.pem");

  struct TestConfig;
  impl TokenConfigProvider for TestConfig {
    fn encoding_key_pem(&self) -> &str {
      TEST_SK
    }
    fn decoding_key_pem(&self) -> &str {
      TEST_PK
    }
  }

  fn token_manager() -> TokenManager {
    TokenManager::from_config(&TestConfig).unwrap()
  }

  #[derive(Default)]
  struct FakeRefreshTokens {
    rows: Mutex<Vec<RefreshToken>>,
    next_id: Mutex<i64>,
  }

  #[async_trait]
  impl RefreshTokenRepository for FakeRefreshTokens {
    async fn create(&self, input: NewRefreshToken) -> Result<RefreshToken, CoreError> {
      let mut next_id = self.next_id.lock().unwrap();
      *next_id += 1;
      let row = RefreshToken {
        id: RefreshTokenId::new(*next_id),
        user_id: input.user_id,
        token_hash: input.token_hash,
        app_id: input.app_id,
        expires_at: input.expires_at,
        revoked: false,
        revoked_at: None,
        issued_at: Utc::now(),
      };
      self.rows.lock().unwrap().push(row.clone());
      Ok(row)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn revoke(&self, id: RefreshTokenId) -> Result<(), CoreError> {
      if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| r.id == id) {
        row.revoked = true;
        row.revoked_at = Some(Utc::now());
      }
      Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> Result<(), CoreError> {
      for row in self.rows.lock().unwrap().iter_mut().filter(|r| r.user_id == user_id) {
        row.revoked = true;
        row.revoked_at = Some(Utc::now());
      }
      Ok(())
    }
  }

  #[derive(Default)]
  struct FakeSsoSessions {
    rows: Mutex<Vec<crate::models::token::SsoSession>>,
    next_id: Mutex<i64>,
  }

  #[async_trait]
  impl SsoSessionRepository for FakeSsoSessions {
    async fn create(&self, user_id: UserId, session_token_hash: String, expires_at: chrono::DateTime<Utc>) -> Result<crate::models::token::SsoSession, CoreError> {
      let mut next_id = self.next_id.lock().unwrap();
      *next_id += 1;
      let row = crate::models::token::SsoSession {
        id: *next_id,
        user_id,
        session_token_hash,
        expires_at,
        last_activity_at: Utc::now(),
      };
      self.rows.lock().unwrap().push(row.clone());
      Ok(row)
    }

    async fn find_by_hash(&self, session_token_hash: &str) -> Result<Option<crate::models::token::SsoSession>, CoreError> {
      Ok(self.rows.lock().unwrap().iter().find(|r| r.session_token_hash == session_token_hash).cloned())
    }

    async fn bump_activity(&self, id: i64, now: chrono::DateTime<Utc>) -> Result<(), CoreError> {
      if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| r.id == id) {
        row.last_activity_at = now;
      }
      Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), CoreError> {
      self.rows.lock().unwrap().retain(|r| r.id != id);
      Ok(())
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<(), CoreError> {
      self.rows.lock().unwrap().retain(|r| r.user_id != user_id);
      Ok(())
    }
  }

  #[tokio::test]
  async fn issue_pair_creates_refresh_token_and_sso_session() {
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens::default();
    let sso_sessions = FakeSsoSessions::default();
    let service = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let user_id = UserId::new(1);
    let app_id = AppId::new();

    let issued = service.issue_pair(user_id, app_id).await.unwrap();
    assert!(tm.verify_access_token(&issued.access_token).is_ok());
    assert_eq!(refresh_tokens.rows.lock().unwrap().len(), 1);
    assert_eq!(sso_sessions.rows.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn refresh_rotates_token_and_rejects_wrong_app() {
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens::default();
    let sso_sessions = FakeSsoSessions::default();
    let service = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let user_id = UserId::new(2);
    let app_id = AppId::new();
    let issued = service.issue_pair(user_id, app_id).await.unwrap();

    let wrong_app = service.refresh(&issued.refresh_token, AppId::new()).await;
    assert!(matches!(wrong_app, Err(CoreError::InvalidToken)));

    let rotated = service.refresh(&issued.refresh_token, app_id).await.unwrap();
    assert_ne!(rotated.refresh_token, issued.refresh_token);
    assert_eq!(refresh_tokens.rows.lock().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn reusing_a_rotated_refresh_token_revokes_every_sibling() {
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens::default();
    let sso_sessions = FakeSsoSessions::default();
    let service = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let user_id = UserId::new(3);
    let app_id = AppId::new();
    let issued = service.issue_pair(user_id, app_id).await.unwrap();
    let rotated = service.refresh(&issued.refresh_token, app_id).await.unwrap();

    // Replaying the already-rotated token must revoke the rotated sibling too.
    let reused = service.refresh(&issued.refresh_token, app_id).await;
    assert!(matches!(reused, Err(CoreError::InvalidToken)));
    let still_valid = service.refresh(&rotated.refresh_token, app_id).await;
    assert!(matches!(still_valid, Err(CoreError::InvalidToken)));
  }

  #[tokio::test]
  async fn revoke_all_for_user_clears_refresh_tokens_and_sso_sessions() {
    let tm = token_manager();
    let refresh_tokens = FakeRefreshTokens::default();
    let sso_sessions = FakeSsoSessions::default();
    let service = TokenDomainService::new(&tm, &refresh_tokens, &sso_sessions);
    let user_id = UserId::new(4);
    service.issue_pair(user_id, AppId::new()).await.unwrap();

    service.revoke_all_for_user(user_id).await.unwrap();
    assert!(sso_sessions.rows.lock().unwrap().is_empty());
    assert!(refresh_tokens.rows.lock().unwrap().iter().all(|r| r.revoked));
  }
}
