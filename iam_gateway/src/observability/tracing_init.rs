//! Tracing setup, extending the teacher's plain
//! `tracing_subscriber::registry().with(fmt::layer())...init()` with an
//! optional hourly rolling file writer, the way
//! `services/infrastructure/observability/tracing.rs` layers a
//! `tracing_appender::rolling::hourly` sink alongside stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

/// Must be held for the lifetime of the process — dropping it stops the
/// background flush thread for the file sink.
pub struct TracingGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

pub fn init_tracing(config: &ObservabilityConfig) -> TracingGuard {
  match &config.log_file_path {
    Some(dir) => {
      let file_appender = tracing_appender::rolling::hourly(dir, "iam_gateway.log");
      let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
      tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();
      TracingGuard(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();
      TracingGuard(None)
    }
  }
}
