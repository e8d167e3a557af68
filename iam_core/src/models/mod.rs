pub mod application;
pub mod audit;
pub mod ids;
pub mod organization;
pub mod quota;
pub mod rbac;
pub mod subscription;
pub mod token;
pub mod user;
pub mod verification;

pub use application::*;
pub use audit::*;
pub use ids::*;
pub use organization::*;
pub use quota::*;
pub use rbac::*;
pub use subscription::*;
pub use token::*;
pub use user::*;
pub use verification::*;
