//! Turnstile gateway HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p turnstile-gateway --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p turnstile-gateway
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p turnstile-gateway
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `HOST` - Override bind address (default: `0.0.0.0`)
//! - `PORT` - Override port (default: `3000`)
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::net::SocketAddr;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use turnstile::Gate;
use turnstile_http::constants::CREDENTIAL_HEADER;

use turnstile_gateway::config::GatewayConfig;
use turnstile_gateway::routes::{cors_layer, router};
use turnstile_gateway::util::SigDown;

#[tokio::main]
async fn main() {
    // Values referenced as $VAR in config.toml may come from .env
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Gateway failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    let gate_config = config.gate_config()?;
    let ledger = config.ledger(&gate_config)?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        recipient = %gate_config.recipient(),
        price = %gate_config.price(),
        network = gate_config.asset().network,
        rpc_urls = config.rpc_urls.len(),
        "Loaded configuration"
    );
    if config.rpc_urls.is_empty() {
        tracing::warn!("No rpc_urls configured, using the public endpoint of the network");
    }

    let app = router(Gate::new(gate_config, ledger))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer()?);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Turnstile gateway listening on http://{addr}");
    tracing::info!("Paid routes: http://{addr}/api/data (send {CREDENTIAL_HEADER} or pay first)");

    let sig_down = SigDown::try_new()?;
    let token = sig_down.cancellation_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    sig_down.recv().await;

    tracing::info!("Gateway shut down gracefully");
    Ok(())
}
