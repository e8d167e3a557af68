//! HTTP handlers for the gateway's wire surface (spec §6.1). Each
//! handler composes the domain service(s) it needs from `AppState`'s
//! repository accessor methods; the ordered admission pipeline
//! (`crate::middlewares`) has already run by the time a handler body
//! executes.

pub mod auth;
pub mod health;
pub mod info;
pub mod quota;
pub mod users;
