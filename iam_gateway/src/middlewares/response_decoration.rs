//! Response decoration (spec §4.H step 8, second half): stamps the
//! correlation `request_id` into every JSON body — success or error — and
//! measures server time, mirroring the teacher's `ServerTimeLayer`
//! (`fechatter_server/src/middlewares/server_time.rs`) for the timing
//! half and doing the body rewrite a single pipeline stage handles
//! rather than scattering it across every handler.

use axum::{
  Extension,
  body::{Body, to_bytes},
  extract::Request,
  http::HeaderValue,
  middleware::Next,
  response::Response,
};
use iam_core::middlewares::RequestId;
use tokio::time::Instant;

use crate::observability::metrics::record_request_duration;

const RESPONSE_TIME_HEADER: &str = "x-response-time";
const REQUEST_ID_BODY_FIELD: &str = "request_id";
const MAX_BUFFERED_BODY_BYTES: usize = 10 * 1024 * 1024;

pub async fn response_decoration_middleware(
  Extension(request_id): Extension<RequestId>,
  req: Request<Body>,
  next: Next,
) -> Response {
  let start = Instant::now();
  let route = route_label(req.uri().path());
  let response = next.run(req).await;
  record_request_duration(&route, start.elapsed());
  let (mut parts, body) = response.into_parts();

  let bytes = match to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
    Ok(bytes) => bytes,
    Err(_) => {
      // Body exceeded the buffering limit or the stream errored; ship it
      // through untouched rather than dropping the response.
      return Response::from_parts(parts, Body::empty());
    }
  };

  let decorated = match serde_json::from_slice::<serde_json::Value>(&bytes) {
    Ok(serde_json::Value::Object(mut map)) => {
      map.insert(
        REQUEST_ID_BODY_FIELD.to_string(),
        serde_json::Value::String(request_id.0.clone()),
      );
      serde_json::to_vec(&serde_json::Value::Object(map)).unwrap_or_else(|_| bytes.to_vec())
    }
    _ => bytes.to_vec(),
  };

  if let Ok(value) = HeaderValue::from_str(&decorated.len().to_string()) {
    parts.headers.insert(axum::http::header::CONTENT_LENGTH, value);
  }
  if let Ok(value) = HeaderValue::from_str(&start.elapsed().as_millis().to_string()) {
    parts.headers.insert(RESPONSE_TIME_HEADER, value);
  }

  Response::from_parts(parts, Body::from(decorated))
}

/// Collapses numeric path segments (`/users/42` -> `/users/{id}`) so the
/// route label stays low-cardinality for the metrics backend.
fn route_label(path: &str) -> String {
  path
    .split('/')
    .map(|segment| {
      if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
        "{id}"
      } else {
        segment
      }
    })
    .collect::<Vec<_>>()
    .join("/")
}
