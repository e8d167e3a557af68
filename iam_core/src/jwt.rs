//! Access-token codec and refresh-token hashing helpers (spec §4.B).
//!
//! Only the access-token format is a self-contained codec here; refresh
//! tokens are opaque random strings whose *hash* this module also knows
//! how to compute, but whose storage/rotation lifecycle lives in
//! `services::token_domain` (it needs a repository).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::models::ids::{AppId, UserId};

const JWT_ISSUER: &str = "iam-platform";
const JWT_LEEWAY_SECS: u64 = 60;

/// Default access-token lifetime: 15 minutes (spec §4.B).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Default refresh-token lifetime: 7 days (spec §4.B).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Default SSO session lifetime: 24 hours (spec §4.B).
pub const SSO_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Access-token claims. `token_type` is always `"access"`; tokens minted
/// before application-binding existed (no `app_id`) are rejected by
/// [`TokenManager::verify_access_token`], matching invariant 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
  pub sub: String,
  pub app_id: uuid::Uuid,
  pub iat: i64,
  pub exp: i64,
  pub token_type: String,
  pub jti: String,
  pub iss: String,
}

impl AccessClaims {
  pub fn user_id(&self) -> Result<UserId, CoreError> {
    self
      .sub
      .parse::<i64>()
      .map(UserId::new)
      .map_err(|_| CoreError::InvalidToken)
  }

  pub fn app_id(&self) -> AppId {
    AppId(self.app_id)
  }
}

/// Key material and validation policy for access tokens. Held by the
/// runtime context (spec §9's "pure functions parameterized by the
/// signing key set").
#[derive(Clone)]
pub struct TokenManager {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  validation: Validation,
  ttl_secs: i64,
}

impl std::fmt::Debug for TokenManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenManager")
      .field("ttl_secs", &self.ttl_secs)
      .finish_non_exhaustive()
  }
}

/// Key-set provider so a production runtime context can swap in rotated
/// PEM material without touching the codec itself.
pub trait TokenConfigProvider {
  fn encoding_key_pem(&self) -> &str;
  fn decoding_key_pem(&self) -> &str;
  fn access_token_ttl_secs(&self) -> i64 {
    ACCESS_TOKEN_TTL_SECS
  }
  fn leeway_secs(&self) -> u64 {
    JWT_LEEWAY_SECS
  }
}

impl TokenManager {
  pub fn from_config<C: TokenConfigProvider>(config: &C) -> Result<Self, CoreError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = config.leeway_secs();
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.set_issuer(&[JWT_ISSUER]);

    let sk = config.encoding_key_pem().replace("\\n", "\n");
    let pk = config.decoding_key_pem().replace("\\n", "\n");

    Ok(Self {
      encoding_key: EncodingKey::from_rsa_pem(sk.as_bytes())
        .map_err(|e| CoreError::Internal(format!("invalid RSA signing key: {e}")))?,
      decoding_key: DecodingKey::from_rsa_pem(pk.as_bytes())
        .map_err(|e| CoreError::Internal(format!("invalid RSA verification key: {e}")))?,
      validation,
      ttl_secs: config.access_token_ttl_secs(),
    })
  }

  /// Issues a signed access token for `(user_id, app_id)`.
  pub fn issue_access_token(&self, user_id: UserId, app_id: AppId) -> Result<String, CoreError> {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
      sub: user_id.to_string(),
      app_id: app_id.0,
      iat: now,
      exp: now + self.ttl_secs,
      token_type: "access".to_string(),
      jti: uuid::Uuid::new_v4().to_string(),
      iss: JWT_ISSUER.to_string(),
    };
    let header = Header::new(Algorithm::RS256);
    encode(&header, &claims, &self.encoding_key).map_err(CoreError::from)
  }

  /// Validates signature, expiry, and the `token_type`/`app_id` claims
  /// that make §4.B's binding invariant enforceable. Does not check the
  /// caller-supplied `X-App-Id` against `claims.app_id` — that cross-check
  /// belongs to the gateway pipeline, which knows the caller's app id.
  pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, CoreError> {
    let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?;
    if data.claims.token_type != "access" {
      return Err(CoreError::InvalidToken);
    }
    Ok(data.claims)
  }
}

/// 32 random bytes, hex-encoded — the opaque refresh-token format.
pub fn generate_refresh_token() -> String {
  random_hex(32)
}

/// 64 random bytes, hex-encoded — the SSO session token format (spec
/// §4.B: "64-byte URL-safe random"; hex is used here for the same reason
/// the teacher hex-encodes refresh tokens — it is trivially safe in a
/// header/URL without a separate encoding step).
pub fn generate_sso_session_token() -> String {
  random_hex(64)
}

fn random_hex(len_bytes: usize) -> String {
  let mut bytes = vec![0u8; len_bytes];
  rand::thread_rng().fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Hashes an opaque token (refresh token or SSO session token) for
/// storage — only the hash ever touches the database.
pub fn sha256_hash(token: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(token.as_bytes());
  hex::encode(hasher.finalize())
}

pub fn is_expired(expires_at: DateTime<Utc>) -> bool {
  Utc::now() >= expires_at
}
