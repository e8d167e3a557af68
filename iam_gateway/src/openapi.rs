//! OpenAPI surface, grounded on the teacher's `openapi.rs`: a
//! `#[derive(OpenApi)]` schema catalogue plus hand-served Swagger/Redoc
//! HTML shells pointed at a `/api-docs/openapi.json` route, rather than
//! pulling in `utoipa-swagger-ui`'s bundled asset router.

use axum::{Router, response::Html, response::Json, routing::get};
use utoipa::{
  Modify, OpenApi,
  openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::dtos::{
  AssignRolesRequest, AssignRolesResponse, AuthResponse, CheckPermissionRequest, CheckPermissionResponse,
  ChangePasswordRequest, HealthResponse, InfoResponse, LoginEmailCodeRequest, LoginPhoneCodeRequest, LoginRequest,
  LogoutRequest, OAuthLoginRequest, PermissionsResponse, QuotaUsageResponse, RefreshRequest, RegisterEmailRequest,
  RegisterPhoneRequest, RegisterResponse, RoleIdsResponse, SendCodeResponse, SendEmailCodeRequest,
  SendSmsCodeRequest, SuccessResponse, UserSummary,
};
use crate::error::ErrorBody;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
  components(
    schemas(
      ErrorBody,
      RegisterEmailRequest,
      RegisterPhoneRequest,
      SendEmailCodeRequest,
      SendSmsCodeRequest,
      LoginRequest,
      LoginPhoneCodeRequest,
      LoginEmailCodeRequest,
      OAuthLoginRequest,
      RefreshRequest,
      LogoutRequest,
      ChangePasswordRequest,
      AssignRolesRequest,
      CheckPermissionRequest,
      AuthResponse,
      RegisterResponse,
      SendCodeResponse,
      RoleIdsResponse,
      PermissionsResponse,
      CheckPermissionResponse,
      QuotaUsageResponse,
      HealthResponse,
      InfoResponse,
      SuccessResponse,
      AssignRolesResponse,
      UserSummary,
    )
  ),
  modifiers(&SecurityAddon),
  tags(
    (name = "auth", description = "Registration, login, token lifecycle"),
    (name = "users", description = "Profile, role and permission management"),
    (name = "quota", description = "Quota usage reporting"),
  )
)]
pub(crate) struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
  fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
    if let Some(components) = openapi.components.as_mut() {
      components.add_security_scheme(
        "access_token",
        SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
      );
      components.add_security_scheme(
        "app_credentials",
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-App-Secret"))),
      );
    }
  }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
  Json(ApiDoc::openapi())
}

async fn swagger_ui() -> Html<&'static str> {
  Html(
    r#"<!DOCTYPE html>
<html>
<head>
  <title>IAM Gateway API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.1.0/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5.1.0/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({
      url: '/api-docs/openapi.json',
      dom_id: '#swagger-ui',
      presets: [SwaggerUIBundle.presets.apis, SwaggerUIBundle.presets.standalone]
    });
  </script>
</body>
</html>"#,
  )
}

pub(crate) trait OpenApiRouter {
  fn openapi_routes(self) -> Self;
}

impl OpenApiRouter for Router<AppState> {
  fn openapi_routes(self) -> Self {
    self
      .route("/api-docs/openapi.json", get(openapi_json))
      .route("/swagger-ui", get(swagger_ui))
      .route("/swagger-ui/", get(swagger_ui))
  }
}
