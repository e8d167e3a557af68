//! The ordered gateway admission pipeline (spec §4.H). Each stage is a
//! focused `axum` middleware composed onto the router in `lib.rs`, the
//! way the teacher composes its `ServiceBuilder` stack in
//! `middlewares/core/middlewares.rs` generalized into the steps this
//! spec names.

pub mod app_context;
pub mod binding_check;
pub mod login_method_gate;
pub mod quota_gate;
pub mod rate_limit;
pub mod response_decoration;
pub mod scope_gate;

pub use app_context::{ResolvedApplication, app_credential_auth_middleware, bearer_app_context_middleware};
pub use binding_check::binding_check_middleware;
pub use login_method_gate::login_method_gate;
pub use quota_gate::quota_gate_middleware;
pub use rate_limit::rate_limit_middleware;
pub use response_decoration::response_decoration_middleware;
pub use scope_gate::scope_gate;
