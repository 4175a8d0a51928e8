//! Gateway configuration.
//!
//! Loads configuration from a TOML file. `$VAR` and `${VAR}` references are
//! expanded from the process environment before parsing, so secrets can stay
//! out of the file.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3000
//! recipient = "0x5569A8d923f114455DeF7ae9731E26B9B8EA1D36"
//! price = "0.01"
//! secret = "$TURNSTILE_SECRET"
//! network = "base"
//! token_ttl_seconds = 3600
//! ledger_timeout_seconds = 10
//!
//! [[rpc_urls]]
//! url = "https://mainnet.base.org"
//! rate_limit = 10
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Any variable referenced by `$VAR` in the config file

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use turnstile::{Decimal, GateConfig};
use turnstile_evm::RpcLedger;
use url::Url;

use crate::error::GatewayError;

/// Top-level gateway configuration.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `3000`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address receiving payments.
    pub recipient: String,

    /// Price per redeemed payment, in whole units of the settlement asset.
    pub price: Decimal,

    /// Secret signing the bypass credentials.
    pub secret: String,

    /// Settlement network name (default: `base`).
    #[serde(default = "default_network")]
    pub network: String,

    /// Credential lifetime in seconds (default: `3600`).
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,

    /// JSON-RPC endpoints of the settlement network. When empty, the public
    /// endpoint of the network is used.
    #[serde(default)]
    pub rpc_urls: Vec<RpcEndpoint>,

    /// Time allowed for a single ledger query, in seconds (default: `10`).
    #[serde(default = "default_ledger_timeout")]
    pub ledger_timeout_seconds: u64,
}

/// One JSON-RPC endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcEndpoint {
    /// HTTP(S) endpoint URL.
    pub url: Url,
    /// Maximum requests per second, if the endpoint is rate limited.
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    3000
}

fn default_network() -> String {
    "base".to_owned()
}

const fn default_token_ttl() -> u64 {
    3600
}

const fn default_ledger_timeout() -> u64 {
    10
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("recipient", &self.recipient)
            .field("price", &self.price)
            .field("secret", &"<redacted>")
            .field("network", &self.network)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("rpc_urls", &self.rpc_urls)
            .field("ledger_timeout_seconds", &self.ledger_timeout_seconds)
            .finish()
    }
}

impl GatewayConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// `HOST` and `PORT` env vars override the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, GatewayError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is treated as empty, leaving every value to the
    /// environment and the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, GatewayError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| GatewayError::Read {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };

        let mut config = Self::from_toml(&content, |name| std::env::var(name).ok())?;

        if let Some(host) = std::env::var("HOST").ok().and_then(|h| h.parse().ok()) {
            config.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }

        Ok(config)
    }

    /// Parses configuration from TOML text, resolving variables with `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Parse`] if the expanded text is not a valid
    /// configuration, and [`GatewayError::ZeroLedgerTimeout`] for a zero ledger timeout.
    pub fn from_toml(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GatewayError> {
        let expanded = expand_vars(content, lookup);
        let config: Self = toml::from_str(&expanded)?;
        if config.ledger_timeout_seconds == 0 {
            return Err(GatewayError::ZeroLedgerTimeout);
        }
        Ok(config)
    }

    /// Builds the gate settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a value still references an unset variable or if
    /// the gate rejects the settings.
    pub fn gate_config(&self) -> Result<GateConfig, GatewayError> {
        if self.secret.starts_with('$') {
            return Err(GatewayError::UnresolvedVariable("secret"));
        }
        if self.recipient.starts_with('$') {
            return Err(GatewayError::UnresolvedVariable("recipient"));
        }
        let config = GateConfig::new(&self.recipient, self.price, &self.secret)?
            .with_network(&self.network)?
            .with_credential_ttl(Duration::from_secs(self.token_ttl_seconds))?;
        Ok(match self.rpc_urls.first() {
            Some(endpoint) => config.with_ledger_url(endpoint.url.clone()),
            None => config,
        })
    }

    /// Connects the ledger used to verify payments.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ZeroLedgerTimeout`] for a zero ledger timeout and
    /// [`GatewayError::Ledger`] if no usable endpoint is available.
    pub fn ledger(&self, gate: &GateConfig) -> Result<RpcLedger, GatewayError> {
        if self.ledger_timeout_seconds == 0 {
            return Err(GatewayError::ZeroLedgerTimeout);
        }
        let ledger = if self.rpc_urls.is_empty() {
            RpcLedger::for_config(gate)?
        } else {
            let endpoints: Vec<_> = self
                .rpc_urls
                .iter()
                .map(|e| (e.url.clone(), e.rate_limit))
                .collect();
            RpcLedger::http(&endpoints)?
        };
        Ok(ledger.with_timeout(Duration::from_secs(self.ledger_timeout_seconds)))
    }
}

/// Expands `$VAR` and `${VAR}` references using `lookup`.
///
/// Unresolved references are left as written.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            braced.find('}').map_or(("", 0), |end| (&braced[..end], end + 2))
        } else {
            let end = after
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                out.push_str(&after[..consumed]);
            }
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const MINIMAL: &str = r#"
        recipient = "0x5569A8d923f114455DeF7ae9731E26B9B8EA1D36"
        price = "0.01"
        secret = "$TURNSTILE_SECRET"
    "#;

    #[test]
    fn test_expand_plain_and_braced() {
        let lookup = vars(&[("A", "1"), ("B_2", "two")]);
        assert_eq!(expand_vars("x=$A y=${B_2}!", &lookup), "x=1 y=two!");
    }

    #[test]
    fn test_expand_leaves_unresolved_as_written() {
        let lookup = vars(&[]);
        assert_eq!(expand_vars("$MISSING ${ALSO} $ ${", &lookup), "$MISSING ${ALSO} $ ${");
    }

    #[test]
    fn test_defaults_apply() {
        let config = GatewayConfig::from_toml(MINIMAL, vars(&[("TURNSTILE_SECRET", "s3cret")]))
            .unwrap();
        assert_eq!(config.host, default_host());
        assert_eq!(config.port, 3000);
        assert_eq!(config.network, "base");
        assert_eq!(config.token_ttl_seconds, 3600);
        assert_eq!(config.ledger_timeout_seconds, 10);
        assert!(config.rpc_urls.is_empty());
        assert_eq!(config.secret, "s3cret");
    }

    #[test]
    fn test_gate_config_from_file() {
        let content = format!(
            "{MINIMAL}\nnetwork = \"base-sepolia\"\ntoken_ttl_seconds = 60\n\
             [[rpc_urls]]\nurl = \"https://rpc.example.org\"\nrate_limit = 5\n"
        );
        let config =
            GatewayConfig::from_toml(&content, vars(&[("TURNSTILE_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.rpc_urls[0].rate_limit, Some(5));

        let gate = config.gate_config().unwrap();
        assert_eq!(gate.asset().chain_id, 84532);
        assert_eq!(gate.credential_ttl(), Duration::from_secs(60));
        assert_eq!(gate.price(), Decimal::new(1, 2));
        assert_eq!(
            gate.ledger_url().map(Url::as_str),
            Some("https://rpc.example.org/")
        );
    }

    #[test]
    fn test_unresolved_secret_is_rejected() {
        let config = GatewayConfig::from_toml(MINIMAL, vars(&[])).unwrap();
        assert!(matches!(
            config.gate_config(),
            Err(GatewayError::UnresolvedVariable("secret"))
        ));
    }

    #[test]
    fn test_zero_ledger_timeout_is_rejected() {
        let content = format!("{MINIMAL}\nledger_timeout_seconds = 0\n");
        let err = GatewayConfig::from_toml(&content, vars(&[("TURNSTILE_SECRET", "s3cret")]))
            .unwrap_err();
        assert!(matches!(err, GatewayError::ZeroLedgerTimeout));
    }

    #[tokio::test]
    async fn test_ledger_refuses_zero_timeout() {
        let mut config =
            GatewayConfig::from_toml(MINIMAL, vars(&[("TURNSTILE_SECRET", "s3cret")])).unwrap();
        let gate = config.gate_config().unwrap();
        assert!(config.ledger(&gate).is_ok());

        config.ledger_timeout_seconds = 0;
        assert!(matches!(
            config.ledger(&gate),
            Err(GatewayError::ZeroLedgerTimeout)
        ));
    }

    #[test]
    fn test_missing_recipient_fails_to_parse() {
        let err = GatewayConfig::from_toml("price = \"1\"\nsecret = \"x\"", vars(&[])).unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = GatewayConfig::from_toml(MINIMAL, vars(&[("TURNSTILE_SECRET", "s3cret")]))
            .unwrap();
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
