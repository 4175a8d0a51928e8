//! HTTP routes served by the gateway.

use axum::extract::Extension;
use axum::http::header::InvalidHeaderName;
use axum::http::{HeaderName, Method};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use turnstile::ledger::Ledger;
use turnstile::replay::ReplayGuard;
use turnstile::{CredentialClaims, Gate};
use tower_http::cors::{self, CorsLayer};
use turnstile_http::TurnstileLayer;
use turnstile_http::constants::CREDENTIAL_HEADER;

/// Builds the application router.
///
/// `/` and `/health` are free; every route under `/api` is behind `gate`.
pub fn router<L, G>(gate: Gate<L, G>) -> Router
where
    L: Ledger + 'static,
    G: ReplayGuard + 'static,
{
    let paid = Router::new()
        .route("/data", get(premium_data))
        .layer(TurnstileLayer::new(gate));

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .nest("/api", paid)
}

/// Builds the CORS policy, exposing the credential header to browser callers.
///
/// # Errors
///
/// Returns [`InvalidHeaderName`] if the credential header name is not a valid
/// HTTP header name.
pub fn cors_layer() -> Result<CorsLayer, InvalidHeaderName> {
    let credential_header = HeaderName::from_bytes(CREDENTIAL_HEADER.as_bytes())?;
    Ok(CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(cors::Any)
        .expose_headers([credential_header]))
}

async fn welcome() -> Html<&'static str> {
    Html("<h1>Welcome!</h1><p>This page is free. Paid data lives under /api.</p>")
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn premium_data(Extension(claims): Extension<CredentialClaims>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": "This is the premium data that was hidden behind the paywall.",
        "payer": claims.payer,
        "tx_hash": claims.tx_hash,
        "expires_at": claims.exp,
    }))
}
