mod bearer_auth;
mod request_id;

pub use self::bearer_auth::{AppBoundClaims, verify_bearer_token_middleware};
pub use self::request_id::{RequestId, request_id_middleware};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const APP_ID_HEADER: &str = "x-app-id";
pub const APP_SECRET_HEADER: &str = "x-app-secret";

/// Implemented by the runtime context so the generic bearer-auth
/// middleware can verify a token without knowing about `sqlx`/Redis.
pub trait TokenVerifier {
  type Error: std::fmt::Debug;
  type Claims;
  fn verify_token(&self, token: &str) -> Result<Self::Claims, Self::Error>;
}
