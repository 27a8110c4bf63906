//! Mailgate HTTP server
//!
//! Exposes the gateway over a small JSON API: unread mail, drafts, sending,
//! and an API-key authorizer.

pub mod config;
pub mod response;
pub mod routes;

pub use config::GatewayConfig;
pub use routes::{app, AppState};
