//! Default collaborator implementations (spec §6.5). SMTP/SMS delivery
//! and OAuth provider HTTP clients are out of scope (spec §1); these
//! stand in at the trait boundary so the core never needs to know that.

use std::collections::HashMap;

use async_trait::async_trait;
use iam_core::contracts::{NotificationKind, NotificationSender, OAuthProfile, OAuthProvider};
use iam_core::error::CoreError;

/// Logs instead of delivering. Every call succeeds — a verification-code
/// send through this sender always reaches the "delivered" branch, which
/// is what lets `debug` mode return the code in the response without a
/// real SMTP/SMS account configured.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationSender;

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
  async fn send(
    &self,
    kind: NotificationKind,
    to: &str,
    template_name: &str,
    variables: HashMap<String, String>,
  ) -> Result<(), CoreError> {
    tracing::info!(?kind, to, template_name, ?variables, "notification dispatched (logging sender)");
    Ok(())
  }
}

/// Always reports `service_unavailable` — a placeholder for a real OAuth
/// provider client. Kept so `/auth/oauth/{provider}` can be wired to the
/// same pipeline shape as the other login endpoints without shipping a
/// provider-specific HTTP client.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredOAuthProvider;

#[async_trait]
impl OAuthProvider for UnconfiguredOAuthProvider {
  fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
    format!("about:blank?redirect_uri={redirect_uri}&state={state}")
  }

  async fn exchange_and_fetch_profile(&self, _code: &str, _redirect_uri: &str) -> Result<OAuthProfile, CoreError> {
    Err(CoreError::ServiceUnavailable(
      "no OAuth provider configured".to_string(),
    ))
  }
}
