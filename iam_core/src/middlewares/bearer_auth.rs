//! Bearer-token extraction + verification (step 1 of spec §4.H for
//! bearer-token endpoints). The cross-check of the token's `app_id`
//! claim against the caller's `X-App-Id` header lives here too, since it
//! only needs the claims this middleware already extracted — the rest of
//! the admission pipeline (scope gate, rate limit, quota, binding check)
//! lives in `iam_gateway::middlewares` where the domain services are.

use axum::{
  body::Body,
  extract::{FromRequestParts, Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use axum_extra::{
  TypedHeader,
  headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::error::{CoreError, ErrorMapper};

use super::{APP_ID_HEADER, TokenVerifier};

/// Extracted from the access-token claims by [`AppBoundClaims`]; the
/// caller's resolved identity, attached to request extensions for
/// downstream handlers and pipeline stages to read.
pub trait AppBoundClaims {
  fn user_id_string(&self) -> String;
  fn app_id_string(&self) -> String;
}

/// Verifies the `Authorization: Bearer` header against `T::verify_token`,
/// then checks the resulting claims' `app_id` against the `X-App-Id`
/// header (invariant 2 / invariant 11: a token minted for app A must be
/// rejected when presented alongside a different app id).
pub async fn verify_bearer_token_middleware<T, U>(
  State(state): State<T>,
  req: Request<Body>,
  next: Next,
) -> Response
where
  T: TokenVerifier + ErrorMapper<Error = Response> + Clone + Send + Sync + 'static,
  T::Claims: AppBoundClaims,
  <T as TokenVerifier>::Error: Into<CoreError>,
  U: From<T::Claims> + Clone + Send + Sync + 'static,
{
  let (mut parts, body) = req.into_parts();

  let token = match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state).await {
    Ok(bearer) => bearer.token().to_string(),
    Err(e) => {
      warn!("missing or malformed bearer token: {e}");
      return T::map_error(CoreError::InvalidToken);
    }
  };

  let claims = match state.verify_token(&token) {
    Ok(claims) => claims,
    Err(e) => {
      let core_error: CoreError = e.into();
      warn!("token verification failed: {core_error:?}");
      return T::map_error(core_error);
    }
  };

  if !header_app_id_matches(&parts.headers, &claims) {
    return T::map_error(CoreError::InvalidToken);
  }

  let user: U = claims.into();
  let mut req = Request::from_parts(parts, body);
  req.extensions_mut().insert(user);
  next.run(req).await
}

fn header_app_id_matches<C: AppBoundClaims>(headers: &HeaderMap, claims: &C) -> bool {
  match headers.get(APP_ID_HEADER).and_then(|v| v.to_str().ok()) {
    Some(header_app_id) => header_app_id == claims.app_id_string(),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jwt::TokenConfigProvider;
  use crate::jwt::TokenManager;
  use crate::models::ids::{AppId, UserId};
  use axum::{
    Router,
    body::Body,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
  };
  use std::sync::Arc;
  use tower::ServiceExt;

  #[derive(Clone)]
  struct UserClaims {
    user_id: UserId,
    app_id: AppId,
  }

  impl AppBoundClaims for UserClaims {
    fn user_id_string(&self) -> String {
      self.user_id.to_string()
    }
    fn app_id_string(&self) -> String {
      self.app_id.to_string()
    }
  }

  #[derive(Clone)]
  struct Identity {
    #[allow(dead_code)]
    user_id: UserId,
  }

  impl From<UserClaims> for Identity {
    fn from(c: UserClaims) -> Self {
      Identity { user_id: c.user_id }
    }
  }

  #[derive(Clone)]
  struct TestState {
    inner: Arc<TokenManager>,
  }

  impl TokenVerifier for TestState {
    type Claims = UserClaims;
    type Error = crate::error::CoreError;

    fn verify_token(&self, token: &str) -> Result<UserClaims, Self::Error> {
      let claims = self.inner.verify_access_token(token)?;
      Ok(UserClaims {
        user_id: claims.user_id()?,
        app_id: claims.app_id(),
      })
    }
  }

  impl ErrorMapper for TestState {
    type Error = Response;

    fn map_error(error: CoreError) -> Response {
      // A distinct status per kind, so tests can observe that the
      // original `CoreError` variant survived the `TokenVerifier::Error`
      // conversion instead of being collapsed to one generic rejection.
      let status = match error {
        CoreError::TokenExpired => StatusCode::from_u16(498).unwrap(),
        _ => StatusCode::UNAUTHORIZED,
      };
      (status, error.kind()).into_response()
    }
  }

  struct TestConfig {
    sk: String,
    pk: String,
  }

  impl TokenConfigProvider for TestConfig {
    fn encoding_key_pem(&self) -> &str {
      &self.sk
    }
    fn decoding_key_pem(&self) -> &str {
      &self.pk
    }
  }

  async fn handler() -> impl IntoResponse {
    StatusCode::OK
  }

  fn test_state() -> (TestState, AppId) {
    let config = TestConfig {
      sk: include_str!("../../testdata/test_rsa_private.pem").to_string(),
      pk: include_str!("../../testdata/test_rsa_public.pem").to_string(),
    };
    let tm = TokenManager::from_config(&config).unwrap();
    (
      TestState {
        inner: Arc::new(tm),
      },
      AppId::new(),
    )
  }

  #[tokio::test]
  async fn accepts_token_with_matching_app_id() {
    let (state, app_id) = test_state();
    let token = state
      .inner
      .issue_access_token(UserId::new(1), app_id)
      .unwrap();

    let app = Router::new()
      .route("/x", get(handler))
      .layer(from_fn_with_state(
        state.clone(),
        verify_bearer_token_middleware::<TestState, Identity>,
      ))
      .with_state(state);

    let req = Request::builder()
      .uri("/x")
      .header("Authorization", format!("Bearer {token}"))
      .header(APP_ID_HEADER, app_id.to_string())
      .body(Body::empty())
      .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn rejects_token_presented_with_a_different_app_id() {
    let (state, app_id) = test_state();
    let other_app = AppId::new();
    let token = state
      .inner
      .issue_access_token(UserId::new(1), app_id)
      .unwrap();

    let app = Router::new()
      .route("/x", get(handler))
      .layer(from_fn_with_state(
        state.clone(),
        verify_bearer_token_middleware::<TestState, Identity>,
      ))
      .with_state(state);

    let req = Request::builder()
      .uri("/x")
      .header("Authorization", format!("Bearer {token}"))
      .header(APP_ID_HEADER, other_app.to_string())
      .body(Body::empty())
      .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn expired_token_is_distinguished_from_an_invalid_one() {
    struct ExpiredConfig {
      sk: String,
      pk: String,
    }
    impl TokenConfigProvider for ExpiredConfig {
      fn encoding_key_pem(&self) -> &str {
        &self.sk
      }
      fn decoding_key_pem(&self) -> &str {
        &self.pk
      }
      fn access_token_ttl_secs(&self) -> i64 {
        -120
      }
      fn leeway_secs(&self) -> u64 {
        0
      }
    }
    let tm = TokenManager::from_config(&ExpiredConfig {
      sk: include_str!("../../testdata/test_rsa_private.pem").to_string(),
      pk: include_str!("../../testdata/test_rsa_public.pem").to_string(),
    })
    .unwrap();
    let app_id = AppId::new();
    let token = tm.issue_access_token(UserId::new(1), app_id).unwrap();
    let state = TestState { inner: Arc::new(tm) };

    let app = Router::new()
      .route("/x", get(handler))
      .layer(from_fn_with_state(
        state.clone(),
        verify_bearer_token_middleware::<TestState, Identity>,
      ))
      .with_state(state);

    let req = Request::builder()
      .uri("/x")
      .header("Authorization", format!("Bearer {token}"))
      .header(APP_ID_HEADER, app_id.to_string())
      .body(Body::empty())
      .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status().as_u16(), 498);
  }
}
