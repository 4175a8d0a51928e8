//! HTTP hosting for the turnstile payment gate.
//!
//! [`TurnstileLayer`] wraps the routes it is applied to with a
//! [`Gate`](turnstile::Gate): requests carrying a valid credential or a
//! fresh payment proof reach the inner service, everything else is answered
//! with a JSON challenge or rejection.
//!
//! # Modules
//!
//! - [`constants`] - HTTP header names
//! - [`layer`] - Tower layer and service
//! - [`response`] - Rendering of gate outcomes as HTTP responses

pub mod constants;
pub mod layer;
pub mod response;

pub use layer::{TurnstileLayer, TurnstileService};
