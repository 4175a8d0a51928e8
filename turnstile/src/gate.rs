//! The access-decision engine.
//!
//! [`Gate::decide`] classifies a request into one of three lanes, checked in
//! strict priority order:
//!
//! 1. **Bypass**: a valid credential admits the request with no side effects.
//!    An invalid or expired credential is treated as absent and the request
//!    falls through to the payment lane.
//! 2. **Payment**: a payment proof is checked against the replay guard, then
//!    verified on-chain. On success the proof is marked redeemed and only then
//!    is a credential minted.
//! 3. **Challenge**: with no proof of any kind, the caller is told what to pay.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::TxHash;
use rust_decimal::Decimal;
use serde::Serialize;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::GateConfig;
use crate::credential::{CredentialClaims, CredentialCodec, IssuedCredential};
use crate::error::ReplayGuardError;
use crate::ledger::Ledger;
use crate::replay::{MemoryReplayGuard, ReplayGuard};
use crate::timestamp::UnixTimestamp;
use crate::verify::{PaymentVerifier, VerificationError, VerifiedPayment};

/// Request header carrying a bypass credential (client → server), and the
/// response header carrying a freshly issued one (server → client).
pub const CREDENTIAL_HEADER: &str = "X-Turnstile-Token";

/// Request header carrying a payment proof (transaction hash).
pub const PAYMENT_PROOF_HEADER: &str = "X-Turnstile-Payment-Tx";

/// Seconds a caller should wait before retrying after an infrastructure failure.
pub const RETRY_AFTER_SECS: u64 = 5;

/// The proof-bearing parts of an incoming request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateRequest<'a> {
    /// Value of the bypass credential header, if present.
    pub credential: Option<&'a str>,
    /// Value of the payment proof header, if present.
    pub payment_proof: Option<&'a str>,
}

/// Decision taken for one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// A valid credential was presented.
    Admit {
        /// Claims of the presented credential.
        claims: CredentialClaims,
    },
    /// A payment proof was redeemed; forward the request and hand out the credential.
    AdmitAndIssue {
        /// The newly minted credential.
        credential: IssuedCredential,
        /// The payment that was redeemed.
        payment: VerifiedPayment,
    },
    /// The request is refused.
    Reject(RejectReason),
    /// No proof was offered; the caller must pay first.
    Challenge(PaymentChallenge),
}

impl GateOutcome {
    /// Returns `true` when the request may proceed to the protected handler.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit { .. } | Self::AdmitAndIssue { .. })
    }

    /// Claims the admitted request carries, if admitted.
    #[must_use]
    pub const fn claims(&self) -> Option<&CredentialClaims> {
        match self {
            Self::Admit { claims }
            | Self::AdmitAndIssue {
                credential: IssuedCredential { claims, .. },
                ..
            } => Some(claims),
            Self::Reject(_) | Self::Challenge(_) => None,
        }
    }
}

/// Why the payment lane refused a request.
#[derive(Debug, thiserror::Error)]
pub enum RejectReason {
    /// The proof is not a 32-byte hex transaction hash.
    #[error("invalid transaction hash")]
    MalformedProof,
    /// The proof was already exchanged for a credential.
    #[error("transaction hash already used")]
    AlreadyRedeemed,
    /// The proof did not verify, or the ledger could not be reached.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The replay store could not be consulted.
    #[error(transparent)]
    ReplayStore(#[from] ReplayGuardError),
}

impl RejectReason {
    /// HTTP status code of the rejection.
    ///
    /// Replays and malformed proofs are `400`, invalid payments `402`, and
    /// ledger or replay-store outages `503`.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::MalformedProof | Self::AlreadyRedeemed => 400,
            Self::Verification(err) if err.is_infrastructure() => 503,
            Self::Verification(_) => 402,
            Self::ReplayStore(_) => 503,
        }
    }

    /// Returns `true` for rejections caused by infrastructure rather than the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.status() == 503
    }

    /// JSON body describing the rejection.
    #[must_use]
    pub fn body(&self) -> RejectionBody {
        match self {
            Self::MalformedProof | Self::AlreadyRedeemed => RejectionBody {
                error: self.to_string(),
                details: None,
            },
            Self::Verification(err) if err.is_infrastructure() => RejectionBody {
                error: "Payment verification unavailable".to_owned(),
                details: Some(err.to_string()),
            },
            Self::Verification(err) => RejectionBody {
                error: "Payment verification failed".to_owned(),
                details: Some(err.to_string()),
            },
            Self::ReplayStore(_) => RejectionBody {
                error: "Payment verification unavailable".to_owned(),
                details: None,
            },
        }
    }
}

/// Wire shape of a rejection: `{error, details?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionBody {
    /// Short description of the rejection.
    pub error: String,
    /// Human-readable diagnostic, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Wire shape of a challenge: `{error, message, payment_info}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentChallenge {
    /// Always `"Payment Required"`.
    pub error: String,
    /// Human-readable explanation.
    pub message: String,
    /// What to pay and how to retry.
    pub payment_info: PaymentInfo,
}

/// Machine-readable payment instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInfo {
    /// Price per redemption, in whole units of the currency.
    pub price: Decimal,
    /// Currency symbol.
    pub currency: String,
    /// Network name.
    pub network: String,
    /// EIP-155 chain ID of the network.
    pub chain_id: u64,
    /// Token contract to transfer.
    pub asset: String,
    /// Address to pay.
    pub recipient: String,
    /// How to retry once paid.
    pub instruction: String,
}

/// Pay-per-request access gate.
///
/// Generic over the [`Ledger`] used for verification and the [`ReplayGuard`]
/// storing redeemed proofs (in-process by default).
#[derive(Debug, Clone)]
pub struct Gate<L, G = MemoryReplayGuard> {
    config: Arc<GateConfig>,
    verifier: PaymentVerifier<L>,
    codec: CredentialCodec,
    replay: G,
}

impl<L> Gate<L, MemoryReplayGuard> {
    /// Creates a gate with an in-process replay guard.
    #[must_use]
    pub fn new(config: GateConfig, ledger: L) -> Self {
        Self::with_replay_guard(config, ledger, MemoryReplayGuard::new())
    }
}

impl<L, G> Gate<L, G> {
    /// Creates a gate storing redeemed proofs in `replay`.
    #[must_use]
    pub fn with_replay_guard(config: GateConfig, ledger: L, replay: G) -> Self {
        let verifier = PaymentVerifier::new(ledger, *config.asset());
        let codec = CredentialCodec::from_config(&config);
        Self {
            config: Arc::new(config),
            verifier,
            codec,
            replay,
        }
    }

    /// Returns the gate configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Returns the credential codec.
    #[must_use]
    pub const fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// Returns the replay guard.
    #[must_use]
    pub const fn replay_guard(&self) -> &G {
        &self.replay
    }

    /// Returns the payment verifier.
    #[must_use]
    pub const fn verifier(&self) -> &PaymentVerifier<L> {
        &self.verifier
    }

    /// Builds the challenge returned to callers that offered no proof.
    #[must_use]
    pub fn challenge(&self) -> PaymentChallenge {
        let asset = self.config.asset();
        PaymentChallenge {
            error: "Payment Required".to_owned(),
            message: "This endpoint is protected by Turnstile. Please pay to access.".to_owned(),
            payment_info: PaymentInfo {
                price: self.config.price(),
                currency: asset.symbol.to_owned(),
                network: asset.network.to_owned(),
                chain_id: asset.chain_id,
                asset: asset.address.to_string(),
                recipient: self.config.recipient().to_string(),
                instruction: format!(
                    "Send {} to recipient. Retry request with header '{PAYMENT_PROOF_HEADER}: <tx_hash>'.",
                    asset.symbol
                ),
            },
        }
    }
}

impl<L: Ledger, G: ReplayGuard> Gate<L, G> {
    /// Decides what to do with a request.
    #[cfg_attr(feature = "telemetry", instrument(name = "turnstile.decide", skip_all))]
    pub async fn decide(&self, request: &GateRequest<'_>) -> GateOutcome {
        if let Some(token) = request.credential {
            if let Some(claims) = self.codec.validate(token) {
                #[cfg(feature = "telemetry")]
                tracing::debug!(tx = %claims.tx_hash, payer = %claims.payer, "Admitted by bypass credential");
                return GateOutcome::Admit { claims };
            }
            // An invalid or expired credential counts as no credential: the
            // caller may still redeem a payment proof in this same request.
            #[cfg(feature = "telemetry")]
            tracing::debug!("Bypass credential rejected, falling through to payment lane");
        }

        if let Some(proof) = request.payment_proof {
            return match self.redeem(proof).await {
                Ok((credential, payment)) => {
                    #[cfg(feature = "telemetry")]
                    tracing::info!(tx = %payment.tx_hash, payer = %payment.payer, "Payment redeemed, credential issued");
                    GateOutcome::AdmitAndIssue {
                        credential,
                        payment,
                    }
                }
                Err(reason) => {
                    #[cfg(feature = "telemetry")]
                    if reason.is_retryable() {
                        tracing::warn!(%reason, "Payment could not be verified");
                    } else {
                        tracing::info!(%reason, status = reason.status(), "Payment rejected");
                    }
                    GateOutcome::Reject(reason)
                }
            };
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!("No proof offered, issuing payment challenge");
        GateOutcome::Challenge(self.challenge())
    }

    /// Runs the payment lane for one proof.
    ///
    /// Verification happens before the proof is marked redeemed, and marking
    /// happens before the credential is minted. The mark is an atomic
    /// insert-if-absent, so of two concurrent redemptions of the same proof
    /// only one obtains a credential.
    async fn redeem(
        &self,
        proof: &str,
    ) -> Result<(IssuedCredential, VerifiedPayment), RejectReason> {
        let tx_hash = parse_proof(proof)?;
        if self.replay.is_redeemed(&tx_hash).await? {
            return Err(RejectReason::AlreadyRedeemed);
        }

        let payment = self
            .verifier
            .verify(&tx_hash, self.config.recipient(), self.config.price())
            .await?;

        if !self.replay.mark_redeemed(&tx_hash).await? {
            return Err(RejectReason::AlreadyRedeemed);
        }

        let credential = self
            .codec
            .mint(tx_hash, payment.payer, UnixTimestamp::now());
        Ok((credential, payment))
    }
}

/// Parses a payment proof into a transaction hash, ignoring `0x` and hex case.
fn parse_proof(proof: &str) -> Result<TxHash, RejectReason> {
    TxHash::from_str(proof.trim()).map_err(|_| RejectReason::MalformedProof)
}
