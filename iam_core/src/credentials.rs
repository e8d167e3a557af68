//! Password hashing and application-secret generation (spec §4.A).

use argon2::{
  Argon2,
  password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::RngCore;

use crate::error::CoreError;

/// Minimum password length the strength policy enforces.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validates the configurable strength policy *before* hashing: length and
/// mixed character classes. Runs before any KDF work so a rejected
/// password never touches Argon2.
pub fn check_password_strength(password: &str) -> Result<(), CoreError> {
  if password.chars().count() < MIN_PASSWORD_LENGTH {
    return Err(CoreError::PasswordWeak);
  }
  let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
  let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
  let has_digit = password.chars().any(|c| c.is_ascii_digit());
  let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());
  let classes = [has_lower, has_upper, has_digit, has_symbol]
    .iter()
    .filter(|x| **x)
    .count();
  if classes < 2 {
    return Err(CoreError::PasswordWeak);
  }
  Ok(())
}

/// Hashes `password` with Argon2 and a freshly generated per-password
/// salt. Callers must run [`check_password_strength`] first.
pub fn hash_password(password: &str) -> Result<String, CoreError> {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
  Ok(hash.to_string())
}

/// Verifies `password` against a stored Argon2 hash. Constant-time with
/// respect to password content (Argon2's verification is).
pub fn verify_password(password: &str, hash: &str) -> Result<bool, CoreError> {
  let parsed = PasswordHash::new(hash)?;
  Ok(Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok())
}

/// A freshly generated application secret and its webhook counterpart,
/// handed to the operator exactly once at application-creation time.
pub struct GeneratedAppSecrets {
  pub app_secret: String,
  pub webhook_secret: String,
}

/// 32 bytes of uniform-random data, hex-encoded, for both the app secret
/// (only its hash is persisted) and the webhook secret (persisted in
/// plaintext — see spec §4.A and the Open Question in SPEC_FULL.md).
pub fn generate_app_secrets() -> GeneratedAppSecrets {
  GeneratedAppSecrets {
    app_secret: random_hex_secret(),
    webhook_secret: random_hex_secret(),
  }
}

fn random_hex_secret() -> String {
  let mut bytes = [0u8; 32];
  rand::thread_rng().fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Hashes an application secret the same way a password is hashed — it is
/// attacker-controlled input compared at authentication time, so it gets
/// the same memory-hard treatment rather than a bare SHA-256 digest.
pub fn hash_app_secret(secret: &str) -> Result<String, CoreError> {
  hash_password(secret)
}

/// Constant-time (with respect to the candidate secret) comparison of a
/// plaintext app secret against its stored hash.
pub fn verify_app_secret(secret: &str, hash: &str) -> Result<bool, CoreError> {
  verify_password(secret, hash)
}
