#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Access-decision core for pay-per-request HTTP gates.
//!
//! A caller without proof of payment receives a structured challenge. A caller
//! presenting the hash of a settled stablecoin transfer is verified on-chain
//! and issued a short-lived bypass credential. A caller holding a valid
//! credential skips verification entirely.
//!
//! # Modules
//!
//! - [`gate`] - The three-lane request classifier ([`Gate::decide`])
//! - [`verify`] - On-chain payment verification
//! - [`credential`] - Signed, time-bounded bypass credentials
//! - [`replay`] - Exactly-once redemption of payment proofs
//! - [`ledger`] - Interface to the blockchain data source
//! - [`config`] - Gate configuration
//! - [`error`] - Configuration, ledger and replay-store errors
//! - [`asset`] - Known settlement assets
//! - [`timestamp`] - Unix timestamps
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation of lane decisions and verification

pub mod asset;
pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod replay;
pub mod timestamp;
pub mod verify;

pub use config::GateConfig;
pub use credential::{CredentialClaims, CredentialCodec};
pub use gate::{Gate, GateOutcome, GateRequest, RejectReason};
pub use ledger::Ledger;
pub use replay::{MemoryReplayGuard, ReplayGuard};
pub use verify::{PaymentVerifier, VerificationError, VerificationResult};

pub use alloy_primitives::{Address, TxHash};
pub use rust_decimal::Decimal;
