#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM ledger access for the turnstile payment gate.
//!
//! Provides [`RpcLedger`], an implementation of [`turnstile::Ledger`] that reads
//! transaction receipts and ERC-20 `Transfer` events from an Ethereum JSON-RPC
//! node, along with the RPC client plumbing it needs.
//!
//! # Modules
//!
//! - [`contract`] - ERC-20 `Transfer` event binding
//! - [`ledger`] - The JSON-RPC backed ledger
//! - [`provider`] - RPC client construction with rate limiting and fallback
//!
//! # Feature Flags
//!
//! - `telemetry` - Log ledger failures through `tracing`

pub mod contract;
pub mod ledger;
pub mod provider;

mod networks;
pub use networks::*;

pub use ledger::{DEFAULT_QUERY_TIMEOUT, RpcLedger};
pub use provider::{ProviderError, rpc_client};
