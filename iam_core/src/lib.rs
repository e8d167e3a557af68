pub mod contracts;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod state;

pub use error::{CoreError, ErrorMapper};
pub use jwt::TokenManager;
pub use middlewares::TokenVerifier;
pub use models::user::{AuthContext, User, UserStatus};
pub use services::TokenDomainService;
pub use state::{WithCache, WithDbPool, WithTokenManager};
