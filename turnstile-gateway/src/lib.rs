//! Turnstile gateway server.
//!
//! Serves a free landing page and a health check, and puts every route under
//! `/api` behind the payment gate.
//!
//! # Modules
//!
//! - [`config`] - Server configuration with environment variable expansion
//! - [`error`] - Startup error types
//! - [`routes`] - Axum routes and router builder
//! - [`util`] - Shutdown signal handling

pub mod config;
pub mod error;
pub mod routes;
pub mod util;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use routes::router;
