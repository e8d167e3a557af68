//! Entry point: loads configuration, wires tracing and metrics, seeds
//! the bootstrap super-admin, and serves the router — the same shape as
//! the teacher's `main.rs`, extended with the metrics listener and the
//! bootstrap role grant this platform's first-boot story needs.

use std::net::SocketAddr;

use iam_gateway::config::AppConfig;
use iam_gateway::domains::identity::IdentityService;
use iam_gateway::observability::{init_metrics, init_tracing};
use iam_gateway::state::AppState;
use iam_core::contracts::RoleRepository;
use iam_core::models::rbac::SYSTEM_ROLE_SUPER_ADMIN;
use iam_core::services::TokenDomainService;
use iam_core::state::WithTokenManager;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let config = AppConfig::load().expect("failed to load configuration");

  let _tracing_guard = init_tracing(&config.observability);

  if let Some(port) = config.observability.metrics_port {
    if let Err(error) = init_metrics(port) {
      tracing::warn!(%error, "failed to start metrics listener");
    }
  }

  let state = AppState::try_new(config.clone()).await?;
  seed_bootstrap_admin(&state).await?;

  let app = iam_gateway::build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
  info!(%addr, "iam_gateway listening");

  let listener = TcpListener::bind(addr).await?;
  axum::serve(listener, app.into_make_service()).await?;

  Ok(())
}

/// Ensures a super-admin user exists and carries the `super_admin` role,
/// so a fresh deployment always has one caller who can bootstrap the
/// rest of the RBAC graph through the ordinary role-management
/// endpoints.
async fn seed_bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
  let users = state.users();
  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let identity = IdentityService::new(
    &users,
    &token_domain,
    state.config().auth.lockout_threshold,
    state.config().auth.lockout_duration_secs,
  );
  let admin = identity.ensure_bootstrap_admin().await?;

  let roles = state.roles();
  let role = match roles.find_by_name(SYSTEM_ROLE_SUPER_ADMIN).await? {
    Some(role) => role,
    None => {
      roles
        .create(SYSTEM_ROLE_SUPER_ADMIN, "Full platform administrative access")
        .await?
    }
  };
  roles.assign_to_user(admin.id, role.id).await?;

  Ok(())
}
