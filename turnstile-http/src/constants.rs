//! HTTP header names used by the gate.

pub use turnstile::gate::{CREDENTIAL_HEADER, PAYMENT_PROOF_HEADER, RETRY_AFTER_SECS};
