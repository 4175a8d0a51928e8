//! Gateway startup error types.

use turnstile::error::ConfigError;
use turnstile_evm::ProviderError;

/// Errors raised while loading configuration and assembling the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for [`GatewayConfig`](crate::config::GatewayConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A required value still references an unset environment variable.
    #[error("{0} references an unset environment variable")]
    UnresolvedVariable(&'static str),
    /// `ledger_timeout_seconds` is zero, which would fail every ledger query.
    #[error("ledger timeout must be at least one second")]
    ZeroLedgerTimeout,
    /// The gate settings are invalid.
    #[error(transparent)]
    Gate(#[from] ConfigError),
    /// No ledger endpoint could be set up.
    #[error(transparent)]
    Ledger(#[from] ProviderError),
}
