//! Bypass credentials.
//!
//! A bypass credential is a compact HS256 JWS (`header.claims.signature`, each
//! part base64url without padding) asserting that the bearer redeemed a given
//! payment proof. It is self-contained: validation needs only the signing
//! secret and the current time. There is no revocation list; expiry is the
//! only way a credential ends.
//!
//! Validation never explains a failure to the caller. A forged, malformed or
//! expired credential is simply "not a credential".

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, TxHash};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::GateConfig;
use crate::timestamp::UnixTimestamp;

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm advertised in the token header.
const ALGORITHM: &str = "HS256";

/// Claims carried by a bypass credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
    /// Payment proof that was redeemed for this credential.
    pub tx_hash: TxHash,
    /// Address that paid.
    pub payer: Address,
    /// Issuance time.
    pub iat: UnixTimestamp,
    /// Expiry time; the credential is invalid at and after this instant.
    pub exp: UnixTimestamp,
}

/// A freshly minted credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Encoded token handed to the caller.
    pub token: String,
    /// Claims carried by the token.
    pub claims: CredentialClaims,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Why a credential was refused. Kept internal.
#[derive(Debug, thiserror::Error)]
enum CredentialError {
    #[error("token is not three dot-separated segments")]
    Shape,
    #[error("segment is not valid base64url")]
    Encoding(#[from] base64::DecodeError),
    #[error("segment is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm {0}")]
    Algorithm(String),
    #[error("signature mismatch")]
    Signature,
    #[error("expired at {0}")]
    Expired(UnixTimestamp),
}

/// Issues and validates bypass credentials under a gate secret.
#[derive(Clone)]
pub struct CredentialCodec {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CredentialCodec {
    /// Creates a codec signing with `secret` and issuing credentials valid for `ttl`.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret),
            ttl,
        }
    }

    /// Creates a codec from the secret and lifetime of a gate configuration.
    #[must_use]
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.secret(), config.credential_ttl())
    }

    /// Issues a credential for a redeemed payment proof, stamped with the current time.
    #[must_use]
    pub fn issue(&self, tx_hash: TxHash, payer: Address) -> String {
        self.mint(tx_hash, payer, UnixTimestamp::now()).token
    }

    /// Issues a credential as if the current time were `now`.
    #[must_use]
    pub fn issue_at(&self, tx_hash: TxHash, payer: Address, now: UnixTimestamp) -> String {
        self.mint(tx_hash, payer, now).token
    }

    /// Issues a credential and returns it together with the claims it carries.
    ///
    /// # Panics
    ///
    /// Never in practice: the header and claims always serialize.
    #[must_use]
    pub fn mint(&self, tx_hash: TxHash, payer: Address, now: UnixTimestamp) -> IssuedCredential {
        let claims = CredentialClaims {
            tx_hash,
            payer,
            iat: now,
            exp: now + self.ttl,
        };
        let header = Header {
            alg: ALGORITHM.to_owned(),
            typ: "JWT".to_owned(),
        };
        let header = serde_json::to_vec(&header).expect("header serializes");
        let payload = serde_json::to_vec(&claims).expect("claims serialize");
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));
        IssuedCredential {
            token: format!("{signing_input}.{signature}"),
            claims,
        }
    }

    /// Validates a credential against the current time.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<CredentialClaims> {
        self.validate_at(token, UnixTimestamp::now())
    }

    /// Validates a credential as if the current time were `now`.
    ///
    /// Returns the claims when the signature matches and `now` is before the expiry.
    #[must_use]
    pub fn validate_at(&self, token: &str, now: UnixTimestamp) -> Option<CredentialClaims> {
        match self.decode(token, now) {
            Ok(claims) => Some(claims),
            #[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(reason = %err, "Ignoring invalid bypass credential");
                None
            }
        }
    }

    fn decode(&self, token: &str, now: UnixTimestamp) -> Result<CredentialClaims, CredentialError> {
        let token = token.trim();
        let (signing_input, signature) = token.rsplit_once('.').ok_or(CredentialError::Shape)?;
        let (header, claims) = signing_input
            .split_once('.')
            .ok_or(CredentialError::Shape)?;
        if claims.contains('.') {
            return Err(CredentialError::Shape);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature)?;
        self.mac()
            .chain_update(signing_input.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| CredentialError::Signature)?;

        let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)?;
        if header.alg != ALGORITHM {
            return Err(CredentialError::Algorithm(header.alg));
        }
        let claims: CredentialClaims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims)?)?;
        if now >= claims.exp {
            return Err(CredentialError::Expired(claims.exp));
        }
        Ok(claims)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        self.mac().chain_update(input).finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length")
    }
}
