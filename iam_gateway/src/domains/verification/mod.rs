//! Verification-code send/verify flow (spec §4.C), backed by the atomic
//! cache primitives in `iam_core::contracts::CacheStore`.

use std::collections::HashMap;

use iam_core::contracts::{CacheStore, NotificationKind, NotificationSender};
use iam_core::error::CoreError;
use iam_core::models::verification::{
  VERIFICATION_CODE_TTL_SECS, VERIFICATION_RATE_LIMIT_TTL_SECS, VerificationTargetType,
  code_key, generate_verification_code, rate_limit_key,
};

pub struct VerificationService<'a, C, N> {
  pub cache: &'a C,
  pub notifications: &'a N,
  pub debug: bool,
}

impl<'a, C, N> VerificationService<'a, C, N>
where
  C: CacheStore,
  N: NotificationSender,
{
  pub fn new(cache: &'a C, notifications: &'a N, debug: bool) -> Self {
    Self {
      cache,
      notifications,
      debug,
    }
  }

  /// `send` (spec §4.C): fails `code_send_rate_limited` if the rate-limit
  /// key already exists; otherwise writes the code (300 s TTL) and the
  /// rate-limit marker (60 s TTL), then notifies. Returns the generated
  /// code only in debug mode.
  pub async fn send(
    &self,
    target_type: VerificationTargetType,
    target: &str,
  ) -> Result<Option<String>, CoreError> {
    let rate_key = rate_limit_key(target_type, target);
    let claimed = self
      .cache
      .set_nx_ex(&rate_key, "1", VERIFICATION_RATE_LIMIT_TTL_SECS)
      .await?;
    if !claimed {
      return Err(CoreError::CodeSendRateLimited);
    }

    let code = generate_verification_code();
    self
      .cache
      .set_ex(&code_key(target_type, target), &code, VERIFICATION_CODE_TTL_SECS)
      .await?;

    let kind = match target_type {
      VerificationTargetType::Email => NotificationKind::Email,
      VerificationTargetType::Phone => NotificationKind::Sms,
    };
    let mut variables = HashMap::new();
    variables.insert("code".to_string(), code.clone());
    // Verification-code sending is the one notification path the spec
    // requires to surface a failure rather than swallow it (§6.5).
    self
      .notifications
      .send(kind, target, "verification_code", variables)
      .await
      .map_err(|_| CoreError::ServiceUnavailable("notification delivery failed".to_string()))?;

    Ok(if self.debug { Some(code) } else { None })
  }

  /// `verify_and_consume` (spec §4.C / invariant 4): a matching code is
  /// deleted before returning success; a mismatch leaves the stored code
  /// intact so the 300 s window still bounds the number of guesses an
  /// attacker gets.
  pub async fn verify_and_consume(
    &self,
    target_type: VerificationTargetType,
    target: &str,
    submitted_code: &str,
  ) -> Result<(), CoreError> {
    let key = code_key(target_type, target);
    let stored = self.cache.get(&key).await?;
    match stored {
      Some(code) if code == submitted_code => {
        self.cache.delete(&key).await?;
        Ok(())
      }
      _ => Err(CoreError::CodeInvalidOrExpired),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;

  #[derive(Default)]
  struct FakeCache {
    entries: Mutex<HashMap<String, String>>,
  }

  #[async_trait]
  impl CacheStore for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
      Ok(self.entries.lock().unwrap().get(key).cloned())
    }
    async fn set_ex(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), CoreError> {
      self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
      Ok(())
    }
    async fn set_nx_ex(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<bool, CoreError> {
      let mut entries = self.entries.lock().unwrap();
      if entries.contains_key(key) {
        return Ok(false);
      }
      entries.insert(key.to_string(), value.to_string());
      Ok(true)
    }
    async fn get_and_delete(&self, key: &str) -> Result<Option<String>, CoreError> {
      Ok(self.entries.lock().unwrap().remove(key))
    }
    async fn delete(&self, key: &str) -> Result<(), CoreError> {
      self.entries.lock().unwrap().remove(key);
      Ok(())
    }
    async fn incr(&self, key: &str, amount: i64, _ttl_secs: u64) -> Result<i64, CoreError> {
      let mut entries = self.entries.lock().unwrap();
      let current: i64 = entries.get(key).and_then(|v| v.parse().ok()).unwrap_or(0);
      let updated = current + amount;
      entries.insert(key.to_string(), updated.to_string());
      Ok(updated)
    }
  }

  #[derive(Default)]
  struct FakeNotifications {
    sent: Mutex<Vec<(NotificationKind, String)>>,
    fail: bool,
  }

  #[async_trait]
  impl NotificationSender for FakeNotifications {
    async fn send(
      &self,
      kind: NotificationKind,
      to: &str,
      _template_name: &str,
      _variables: std::collections::HashMap<String, String>,
    ) -> Result<(), CoreError> {
      if self.fail {
        return Err(CoreError::ServiceUnavailable("simulated failure".to_string()));
      }
      self.sent.lock().unwrap().push((kind, to.to_string()));
      Ok(())
    }
  }

  #[tokio::test]
  async fn send_then_verify_round_trips_in_debug_mode() {
    let cache = FakeCache::default();
    let notifications = FakeNotifications::default();
    let service = VerificationService::new(&cache, &notifications, true);

    let code = service
      .send(VerificationTargetType::Email, "alice@example.com")
      .await
      .unwrap()
      .expect("debug mode returns the code");

    service
      .verify_and_consume(VerificationTargetType::Email, "alice@example.com", &code)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn wrong_code_leaves_the_stored_code_intact() {
    let cache = FakeCache::default();
    let notifications = FakeNotifications::default();
    let service = VerificationService::new(&cache, &notifications, true);
    let code = service
      .send(VerificationTargetType::Phone, "+15551234")
      .await
      .unwrap()
      .unwrap();

    let wrong = service.verify_and_consume(VerificationTargetType::Phone, "+15551234", "000000").await;
    assert!(matches!(wrong, Err(CoreError::CodeInvalidOrExpired)));

    // The stored code is still the correct one after a wrong guess.
    service
      .verify_and_consume(VerificationTargetType::Phone, "+15551234", &code)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn resending_within_the_rate_limit_window_is_rejected() {
    let cache = FakeCache::default();
    let notifications = FakeNotifications::default();
    let service = VerificationService::new(&cache, &notifications, true);
    service.send(VerificationTargetType::Email, "bob@example.com").await.unwrap();

    let second = service.send(VerificationTargetType::Email, "bob@example.com").await;
    assert!(matches!(second, Err(CoreError::CodeSendRateLimited)));
  }

  #[tokio::test]
  async fn production_mode_does_not_return_the_code() {
    let cache = FakeCache::default();
    let notifications = FakeNotifications::default();
    let service = VerificationService::new(&cache, &notifications, false);
    let code = service.send(VerificationTargetType::Email, "carol@example.com").await.unwrap();
    assert!(code.is_none());
  }

  #[tokio::test]
  async fn notification_failure_surfaces_as_service_unavailable() {
    let cache = FakeCache::default();
    let notifications = FakeNotifications { sent: Mutex::new(vec![]), fail: true };
    let service = VerificationService::new(&cache, &notifications, true);
    let result = service.send(VerificationTargetType::Email, "dave@example.com").await;
    assert!(matches!(result, Err(CoreError::ServiceUnavailable(_))));
  }
}
