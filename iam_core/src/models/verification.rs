//! Verification-code store key shapes and codec (spec §3, §4.C). The
//! codes themselves live in the cache, not in Postgres; this module only
//! fixes the key format and the random-code generator so the gateway's
//! cache implementation and its tests agree on both.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationTargetType {
  Email,
  Phone,
}

impl VerificationTargetType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Email => "email",
      Self::Phone => "phone",
    }
  }
}

pub const VERIFICATION_CODE_TTL_SECS: u64 = 300;
pub const VERIFICATION_RATE_LIMIT_TTL_SECS: u64 = 60;

pub fn code_key(target_type: VerificationTargetType, target: &str) -> String {
  format!("{}_code:{}", target_type.as_str(), target)
}

pub fn rate_limit_key(target_type: VerificationTargetType, target: &str) -> String {
  format!("code_rate:{}:{}", target_type.as_str(), target)
}

/// Uniformly random 6-digit decimal code, zero-padded.
pub fn generate_verification_code() -> String {
  let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
  format!("{n:06}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn code_is_always_six_digits() {
    for _ in 0..50 {
      let code = generate_verification_code();
      assert_eq!(code.len(), 6);
      assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
  }

  #[test]
  fn keys_are_namespaced_by_target_type() {
    assert_eq!(
      code_key(VerificationTargetType::Email, "a@x.com"),
      "email_code:a@x.com"
    );
    assert_eq!(
      rate_limit_key(VerificationTargetType::Phone, "+1555"),
      "code_rate:phone:+1555"
    );
  }
}
