//! App-credential-authenticated endpoints: registration, code send,
//! login, refresh, logout (spec §6.1).

use axum::{Extension, Json, extract::State};
use iam_core::contracts::UserRepository;
use iam_core::error::CoreError;
use iam_core::models::application::LoginMethod;
use iam_core::models::audit::NewAuditEntry;
use iam_core::models::verification::VerificationTargetType;
use iam_core::services::token_domain::TokenDomainService;
use iam_core::state::WithTokenManager;
use validator::Validate;

use crate::domains::application_registry::ApplicationRegistryService;
use crate::domains::identity::IdentityService;
use crate::domains::verification::VerificationService;
use crate::dtos::{
  AuthResponse, LoginEmailCodeRequest, LoginPhoneCodeRequest, LoginRequest, LogoutRequest, OAuthLoginRequest,
  RefreshRequest, RegisterEmailRequest, RegisterPhoneRequest, RegisterResponse, SendCodeResponse,
  SendEmailCodeRequest, SendSmsCodeRequest, SuccessResponse, UserSummary,
};
use crate::error::AppError;
use crate::middlewares::ResolvedApplication;
use crate::state::AppState;

fn identity_state(state: &AppState) -> (crate::db::PgUserRepository, crate::db::PgRefreshTokenRepository, crate::db::PgSsoSessionRepository) {
  (state.users(), state.refresh_tokens(), state.sso_sessions())
}

pub async fn register_email(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  Json(body): Json<RegisterEmailRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
  body.validate()?;
  if let Some(code) = &body.verification_code {
    let cache = state.cache_store();
    let notifications = state.notifications();
    let verification = VerificationService::new(&cache, &notifications, state.config().server.debug);
    verification
      .verify_and_consume(VerificationTargetType::Email, &body.email, code)
      .await?;
  }

  let (users, refresh_tokens, sso_sessions) = identity_state(&state);
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let identity = IdentityService::new(
    &users,
    &token_domain,
    state.config().auth.lockout_threshold,
    state.config().auth.lockout_duration_secs,
  );
  let user = identity
    .register(body.username, Some(body.email), None, &body.password)
    .await?;

  let applications = state.applications();
  let registry = ApplicationRegistryService::new(&applications);
  registry.bind_user(app.app_id, user.id).await?;

  state
    .audit_service()
    .record(NewAuditEntry::new("user.register").with_user(user.id));

  Ok(Json(RegisterResponse { user_id: user.id }))
}

pub async fn register_phone(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  Json(body): Json<RegisterPhoneRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
  body.validate()?;
  let cache = state.cache_store();
  let notifications = state.notifications();
  let verification = VerificationService::new(&cache, &notifications, state.config().server.debug);
  verification
    .verify_and_consume(VerificationTargetType::Phone, &body.phone, &body.verification_code)
    .await?;

  let (users, refresh_tokens, sso_sessions) = identity_state(&state);
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let identity = IdentityService::new(
    &users,
    &token_domain,
    state.config().auth.lockout_threshold,
    state.config().auth.lockout_duration_secs,
  );
  let user = identity
    .register(body.username, None, Some(body.phone), &body.password)
    .await?;

  let applications = state.applications();
  let registry = ApplicationRegistryService::new(&applications);
  registry.bind_user(app.app_id, user.id).await?;

  state
    .audit_service()
    .record(NewAuditEntry::new("user.register").with_user(user.id));

  Ok(Json(RegisterResponse { user_id: user.id }))
}

pub async fn send_email_code(
  State(state): State<AppState>,
  Extension(ResolvedApplication(_app)): Extension<ResolvedApplication>,
  Json(body): Json<SendEmailCodeRequest>,
) -> Result<Json<SendCodeResponse>, AppError> {
  body.validate()?;
  let cache = state.cache_store();
  let notifications = state.notifications();
  let verification = VerificationService::new(&cache, &notifications, state.config().server.debug);
  let code = verification
    .send(VerificationTargetType::Email, &body.email)
    .await?;
  Ok(Json(SendCodeResponse { success: true, code }))
}

pub async fn send_sms_code(
  State(state): State<AppState>,
  Extension(ResolvedApplication(_app)): Extension<ResolvedApplication>,
  Json(body): Json<SendSmsCodeRequest>,
) -> Result<Json<SendCodeResponse>, AppError> {
  body.validate()?;
  let cache = state.cache_store();
  let notifications = state.notifications();
  let verification = VerificationService::new(&cache, &notifications, state.config().server.debug);
  let code = verification
    .send(VerificationTargetType::Phone, &body.phone)
    .await?;
  Ok(Json(SendCodeResponse { success: true, code }))
}

async fn issue_auth_response(
  state: &AppState,
  app_id: iam_core::models::ids::AppId,
  user: iam_core::models::User,
  requires_password_change: bool,
  is_new_user: Option<bool>,
) -> Result<AuthResponse, AppError> {
  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let issued = token_domain.issue_pair(user.id, app_id).await?;
  Ok(AuthResponse {
    access_token: issued.access_token,
    refresh_token: issued.refresh_token,
    sso_session_token: issued.sso_session_token,
    token_type: "bearer".to_string(),
    expires_in: issued.expires_in,
    user: UserSummary {
      id: user.id,
      username: user.username,
      email: user.email,
      requires_password_change,
    },
    is_new_user,
  })
}

pub async fn login(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
  body.validate()?;
  if !app.has_login_method(LoginMethod::Email) && !app.has_login_method(LoginMethod::Phone) {
    return Err(AppError::from(CoreError::LoginMethodDisabled));
  }
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
  let outcome = identity.login(&body.identifier, &body.password).await?;
  state
    .audit_service()
    .record(NewAuditEntry::new("user.login").with_user(outcome.user.id));
  let response = issue_auth_response(&state, app.app_id, outcome.user, outcome.requires_password_change, None).await?;
  Ok(Json(response))
}

pub async fn login_phone_code(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  Json(body): Json<LoginPhoneCodeRequest>,
) -> Result<Json<AuthResponse>, AppError> {
  body.validate()?;
  let cache = state.cache_store();
  let notifications = state.notifications();
  let verification = VerificationService::new(&cache, &notifications, state.config().server.debug);
  verification
    .verify_and_consume(VerificationTargetType::Phone, &body.phone, &body.code)
    .await?;

  let users = state.users();
  let user = users
    .find_by_phone(&body.phone)
    .await?
    .ok_or(CoreError::UserNotFound)?;

  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let identity = IdentityService::new(
    &users,
    &token_domain,
    state.config().auth.lockout_threshold,
    state.config().auth.lockout_duration_secs,
  );
  let outcome = identity.login_with_verified_identity(user).await?;
  state
    .audit_service()
    .record(NewAuditEntry::new("user.login").with_user(outcome.user.id));
  let response = issue_auth_response(&state, app.app_id, outcome.user, outcome.requires_password_change, None).await?;
  Ok(Json(response))
}

pub async fn login_email_code(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  Json(body): Json<LoginEmailCodeRequest>,
) -> Result<Json<AuthResponse>, AppError> {
  body.validate()?;
  let cache = state.cache_store();
  let notifications = state.notifications();
  let verification = VerificationService::new(&cache, &notifications, state.config().server.debug);
  verification
    .verify_and_consume(VerificationTargetType::Email, &body.email, &body.code)
    .await?;

  let users = state.users();
  let user = users
    .find_by_email(&body.email)
    .await?
    .ok_or(CoreError::UserNotFound)?;

  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let identity = IdentityService::new(
    &users,
    &token_domain,
    state.config().auth.lockout_threshold,
    state.config().auth.lockout_duration_secs,
  );
  let outcome = identity.login_with_verified_identity(user).await?;
  state
    .audit_service()
    .record(NewAuditEntry::new("user.login").with_user(outcome.user.id));
  let response = issue_auth_response(&state, app.app_id, outcome.user, outcome.requires_password_change, None).await?;
  Ok(Json(response))
}

/// `POST /auth/oauth/{provider}` (spec §6.1). The path segment is
/// informational only — `UnconfiguredOAuthProvider` (the only provider
/// wired up, spec §6.5) always reports `service_unavailable` until a
/// real provider client is configured.
pub async fn oauth_login(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  axum::extract::Path(provider_name): axum::extract::Path<String>,
  Json(body): Json<OAuthLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
  body.validate()?;
  use iam_core::contracts::OAuthProvider;

  let method = match provider_name.as_str() {
    "wechat" => LoginMethod::Wechat,
    "alipay" => LoginMethod::Alipay,
    "google" => LoginMethod::Google,
    "apple" => LoginMethod::Apple,
    _ => return Err(AppError::InvalidRequest(format!("unknown oauth provider: {provider_name}"))),
  };
  if !app.has_login_method(method) {
    return Err(AppError::from(CoreError::LoginMethodDisabled));
  }

  let provider = state.oauth_provider();
  let profile = provider
    .exchange_and_fetch_profile(&body.code, &body.redirect_uri)
    .await?;

  let users = state.users();
  let existing = match &profile.email {
    Some(email) => users.find_by_email(email).await?,
    None => None,
  };

  let (user, is_new_user) = match existing {
    Some(user) => (user, false),
    None => {
      let refresh_tokens = state.refresh_tokens();
      let sso_sessions = state.sso_sessions();
      let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
      let identity = IdentityService::new(
        &users,
        &token_domain,
        state.config().auth.lockout_threshold,
        state.config().auth.lockout_duration_secs,
      );
      let random_password = iam_core::credentials::generate_app_secrets().app_secret;
      let user = identity
        .register(
          profile.display_name.clone(),
          profile.email.clone(),
          None,
          &random_password,
        )
        .await?;
      (user, true)
    }
  };

  let applications = state.applications();
  let registry = ApplicationRegistryService::new(&applications);
  registry.bind_user(app.app_id, user.id).await?;

  state
    .audit_service()
    .record(NewAuditEntry::new("user.oauth_login").with_user(user.id));

  let requires_password_change = !user.password_changed;
  let response = issue_auth_response(&state, app.app_id, user, requires_password_change, Some(is_new_user)).await?;
  Ok(Json(response))
}

pub async fn refresh(
  State(state): State<AppState>,
  Extension(ResolvedApplication(app)): Extension<ResolvedApplication>,
  Json(body): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
  body.validate()?;
  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  let issued = token_domain.refresh(&body.refresh_token, app.app_id).await?;
  Ok(Json(serde_json::json!({
    "access_token": issued.access_token,
    "refresh_token": issued.refresh_token,
    "sso_session_token": issued.sso_session_token,
    "token_type": "bearer",
    "expires_in": issued.expires_in,
  })))
}

pub async fn logout(
  State(state): State<AppState>,
  Extension(ResolvedApplication(_app)): Extension<ResolvedApplication>,
  Json(body): Json<LogoutRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
  body.validate()?;
  let refresh_tokens = state.refresh_tokens();
  let sso_sessions = state.sso_sessions();
  let token_domain = TokenDomainService::new(state.token_manager(), &refresh_tokens, &sso_sessions);
  token_domain.logout(&body.refresh_token).await?;
  Ok(Json(SuccessResponse { success: true }))
}
