//! Ambient observability: structured logging and Prometheus metrics,
//! grounded on the pack's `observability/metrics.rs` modules (every
//! Fechatter subcrate carries one) generalized from per-crate business
//! counters down to the handful this gateway's pipeline actually emits.

pub mod metrics;
pub mod tracing_init;

pub use metrics::init_metrics;
pub use tracing_init::init_tracing;
