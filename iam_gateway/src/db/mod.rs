//! `sqlx`-backed implementations of every `iam_core::contracts` repository
//! trait, one struct per aggregate, each holding a `PgPool` clone — the
//! shape the teacher's repository structs use (see
//! `domains::auth::token_repository::RefreshTokenRepositoryImpl`).

mod application_repo;
mod audit_repo;
mod quota_repo;
mod rbac_repo;
mod subscription_repo;
mod token_repo;
mod user_repo;

pub use application_repo::PgApplicationRepository;
pub use audit_repo::PgAuditRepository;
pub use quota_repo::PgQuotaRepository;
pub use rbac_repo::{PgPermissionRepository, PgRoleRepository};
pub use subscription_repo::PgSubscriptionPlanRepository;
pub use token_repo::{PgRefreshTokenRepository, PgSsoSessionRepository};
pub use user_repo::PgUserRepository;
