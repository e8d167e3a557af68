//! Domain services (spec §4): each wraps the repository contracts it
//! needs for the lifetime of a single request, mirroring
//! `iam_core::services::token_domain`'s shape.

pub mod application_registry;
pub mod audit;
pub mod authorization;
pub mod identity;
pub mod quota;
pub mod verification;
