use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

use tracing::warn;
use uuid::Uuid;

/// HTTP header for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/**
 * Request ID Middleware
 *
 * This middleware is responsible for generating and propagating a unique request ID for each HTTP request.
 * If the request already contains an x-request-id header, it uses that value; otherwise, it generates a new UUID v4.
 * The request ID is added to both request and response headers for request tracing and debugging purposes.
 *
 */
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
  // Reuse an incoming ID so a caller's own correlation id survives the
  // hop; otherwise mint one. Either way it ends up on both the request
  // (for downstream extraction via `RequestId`) and the response.
  let req_id = match req.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
    Some(existing) => existing.to_string(),
    None => {
      let generated = Uuid::new_v4().to_string();
      if let Ok(header_value) = HeaderValue::from_str(&generated) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
      }
      generated
    }
  };

  req.extensions_mut().insert(RequestId(req_id.clone()));

  let mut response = next.run(req).await;

  if let Ok(header_value) = HeaderValue::from_str(&req_id) {
    response
      .headers_mut()
      .insert(REQUEST_ID_HEADER, header_value);
  }

  response
}

/// The correlation id this request carries, set by
/// [`request_id_middleware`] and read by downstream stages (response
/// decoration, audit writes) via `Extension<RequestId>`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Router,
  };
  use tower::ServiceExt;

  async fn test_handler() -> impl IntoResponse {
    StatusCode::OK
  }

  #[tokio::test]
  async fn test_with_existing_header() {
    let app = Router::new()
      .route("/", get(test_handler))
      .layer(from_fn(request_id_middleware));

    let existing_id = "test-request-id-123";
    let request = Request::builder()
      .uri("/")
      .header(REQUEST_ID_HEADER, existing_id)
      .body(Body::empty())
      .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
      response
        .headers()
        .get(REQUEST_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap(),
      existing_id
    );
  }

  #[tokio::test]
  async fn test_without_header() {
    let app = Router::new()
      .route("/", get(test_handler))
      .layer(from_fn(request_id_middleware));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();

    let response_id = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert!(!response_id.is_empty());

    let id_str = response_id.to_str().unwrap();
    assert!(Uuid::parse_str(id_str).is_ok());
  }

  #[tokio::test]
  async fn test_propagation_to_handler() {
    async fn check_header_handler(req: Request<Body>) -> impl IntoResponse {
      let has_header = req.headers().contains_key(REQUEST_ID_HEADER);
      if has_header {
        StatusCode::OK
      } else {
        StatusCode::BAD_REQUEST
      }
    }

    let app = Router::new()
      .route("/", get(check_header_handler))
      .layer(from_fn(request_id_middleware));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
  }

  #[tokio::test]
  async fn test_with_invalid_header_value() {
    let app = Router::new()
      .route("/", get(test_handler))
      .layer(from_fn(request_id_middleware));

    let invalid_id = "invalid-header-value-123";
    let request = Request::builder()
      .uri("/")
      .header(REQUEST_ID_HEADER, invalid_id)
      .body(Body::empty())
      .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
      response
        .headers()
        .get(REQUEST_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap(),
      invalid_id
    );
  }

  #[tokio::test]
  async fn test_header_consistency() {
    let app = Router::new()
      .route("/", get(test_handler))
      .layer(from_fn(request_id_middleware));

    let mut request_ids = Vec::new();

    for _ in 0..5 {
      let request = Request::builder().uri("/").body(Body::empty()).unwrap();

      let response = app.clone().oneshot(request).await.unwrap();
      let id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
      request_ids.push(id);
    }

    let unique_ids: std::collections::HashSet<_> = request_ids.iter().collect();
    assert_eq!(unique_ids.len(), request_ids.len());

    for id in &request_ids {
      assert!(Uuid::parse_str(id).is_ok());
    }
  }
}
