//! Prometheus export, grounded on the pack's `PrometheusBuilder::new()
//! .with_http_listener(addr).install()` pattern (every Fechatter
//! subcrate's `observability/metrics.rs` does this), scoped to the
//! handful of counters the admission pipeline itself emits rather than
//! a per-business-feature metrics catalogue.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Binds the `/metrics` scrape listener on a dedicated port (distinct
/// from the gateway's own `server.port`, matching the rest of the
/// pack's convention of a separate metrics listener per service).
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
  let addr: SocketAddr = ([0, 0, 0, 0], port).into();
  PrometheusBuilder::new().with_http_listener(addr).install()?;
  tracing::info!(%addr, "metrics listener started");
  Ok(())
}

pub fn record_admission_outcome(outcome: &'static str) {
  counter!("iam_gateway_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_request_duration(route: &str, duration: Duration) {
  histogram!("iam_gateway_request_duration_seconds", "route" => route.to_string()).record(duration.as_secs_f64());
}
