//! Audit log writer (spec §4.I): fire-and-forget, never allowed to alter
//! the outcome of the request that triggered it (spec §7's propagation
//! policy).

use std::sync::Arc;

use iam_core::contracts::AuditRepository;
use iam_core::models::audit::NewAuditEntry;

#[derive(Clone)]
pub struct AuditService<A> {
  repo: Arc<A>,
}

impl<A> AuditService<A>
where
  A: AuditRepository + Send + Sync + 'static,
{
  pub fn new(repo: Arc<A>) -> Self {
    Self { repo }
  }

  /// Spawns the write and returns immediately; a failed write is logged
  /// and otherwise invisible to the caller.
  pub fn record(&self, entry: NewAuditEntry) {
    let repo = self.repo.clone();
    tokio::spawn(async move {
      if let Err(error) = repo.append(entry).await {
        tracing::warn!(%error, "audit write failed");
      }
    });
  }
}
