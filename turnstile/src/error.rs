//! Error types shared across the access-decision core.

use std::time::Duration;

/// Errors raised while building a [`GateConfig`](crate::config::GateConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The recipient is not a 20-byte hex address.
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    /// The price is below zero.
    #[error("price must be non-negative, got {0}")]
    NegativePrice(rust_decimal::Decimal),
    /// The credential signing secret is empty.
    #[error("credential signing secret must not be empty")]
    EmptySecret,
    /// The credential lifetime is zero.
    #[error("credential lifetime must be at least one second")]
    ZeroCredentialLifetime,
    /// The settlement network is not known.
    #[error("unknown settlement network: {0}")]
    UnknownNetwork(String),
}

/// Failures reported by a [`Ledger`](crate::ledger::Ledger) implementation.
///
/// Every variant is an infrastructure failure: it says nothing about whether
/// the payment itself is valid.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The RPC transport failed or the node returned an error.
    #[error("ledger transport error: {0}")]
    Transport(String),
    /// The query did not complete in time.
    #[error("ledger query timed out after {0:?}")]
    Timeout(Duration),
    /// The node returned data that could not be decoded.
    #[error("ledger returned undecodable data: {0}")]
    Decode(String),
}

/// Failures reported by a [`ReplayGuard`](crate::replay::ReplayGuard) backing store.
#[derive(Debug, thiserror::Error)]
#[error("replay store unavailable: {0}")]
pub struct ReplayGuardError(pub String);
