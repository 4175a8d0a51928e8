//! Gate configuration.
//!
//! A [`GateConfig`] is built once and then shared read-only by the gate, its
//! payment verifier and its credential codec. The recipient and the price are
//! fixed for the lifetime of a configured gate.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rust_decimal::Decimal;
//! use turnstile::config::GateConfig;
//!
//! let config = GateConfig::new(
//!     "0x5569A8d923f114455DeF7ae9731E26B9B8EA1D36",
//!     Decimal::new(1, 2),
//!     "super-secret-signing-key",
//! )
//! .unwrap()
//! .with_credential_ttl(Duration::from_secs(600))
//! .unwrap();
//! assert_eq!(config.price(), Decimal::new(1, 2));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use url::Url;

use crate::asset::SettlementAsset;
use crate::error::ConfigError;

/// Default lifetime of a bypass credential (one hour).
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(3600);

/// Immutable configuration of a payment gate.
#[derive(Clone)]
pub struct GateConfig {
    recipient: Address,
    price: Decimal,
    secret: Arc<[u8]>,
    credential_ttl: Duration,
    ledger_url: Option<Url>,
    asset: SettlementAsset,
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("recipient", &self.recipient)
            .field("price", &self.price)
            .field("secret", &"<redacted>")
            .field("credential_ttl", &self.credential_ttl)
            .field("ledger_url", &self.ledger_url)
            .field("asset", &self.asset)
            .finish()
    }
}

impl GateConfig {
    /// Creates a configuration for the default settlement asset (USDC on Base).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the recipient is not a hex address, the price
    /// is negative or the secret is empty.
    pub fn new(
        recipient: &str,
        price: Decimal,
        secret: impl AsRef<[u8]>,
    ) -> Result<Self, ConfigError> {
        let recipient = recipient
            .trim()
            .parse::<Address>()
            .map_err(|_| ConfigError::InvalidRecipient(recipient.to_owned()))?;
        if price < Decimal::ZERO {
            return Err(ConfigError::NegativePrice(price));
        }
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self {
            recipient,
            price,
            secret: Arc::from(secret),
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            ledger_url: None,
            asset: SettlementAsset::default(),
        })
    }

    /// Sets how long issued bypass credentials stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCredentialLifetime`] for lifetimes under one second.
    pub fn with_credential_ttl(mut self, ttl: Duration) -> Result<Self, ConfigError> {
        if ttl.as_secs() == 0 {
            return Err(ConfigError::ZeroCredentialLifetime);
        }
        self.credential_ttl = ttl;
        Ok(self)
    }

    /// Overrides the ledger RPC endpoint.
    #[must_use]
    pub fn with_ledger_url(mut self, url: Url) -> Self {
        self.ledger_url = Some(url);
        self
    }

    /// Sets the settlement asset.
    #[must_use]
    pub const fn with_asset(mut self, asset: SettlementAsset) -> Self {
        self.asset = asset;
        self
    }

    /// Sets the settlement asset by network name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownNetwork`] if no known asset matches.
    pub fn with_network(self, network: &str) -> Result<Self, ConfigError> {
        let asset = SettlementAsset::by_network(network)
            .ok_or_else(|| ConfigError::UnknownNetwork(network.to_owned()))?;
        Ok(self.with_asset(asset))
    }

    /// Address that must receive payments.
    #[must_use]
    pub const fn recipient(&self) -> Address {
        self.recipient
    }

    /// Required price per redemption, in whole units of the settlement asset.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Secret used to sign bypass credentials.
    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Lifetime of issued bypass credentials.
    #[must_use]
    pub const fn credential_ttl(&self) -> Duration {
        self.credential_ttl
    }

    /// Ledger endpoint override, if any.
    #[must_use]
    pub const fn ledger_url(&self) -> Option<&Url> {
        self.ledger_url.as_ref()
    }

    /// Asset payments are settled in.
    #[must_use]
    pub const fn asset(&self) -> &SettlementAsset {
        &self.asset
    }
}
