//! On-chain payment verification.
//!
//! [`PaymentVerifier::verify`] checks that a transaction:
//!
//! 1. settled successfully,
//! 2. emitted a `Transfer` of the settlement asset,
//! 3. paid the configured recipient,
//! 4. paid at least the required amount.
//!
//! Addresses are compared as 20-byte values, so the hex casing of either side
//! never matters.

use alloy_primitives::{Address, TxHash, U256};
use rust_decimal::Decimal;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::asset::SettlementAsset;
use crate::error::LedgerError;
use crate::ledger::{Ledger, TransferEvent};

/// A payment that passed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// The redeemed transaction.
    pub tx_hash: TxHash,
    /// Sender of the transfer.
    pub payer: Address,
    /// Raw transferred amount.
    pub value: U256,
}

/// Why a payment proof did not verify.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The transaction is unknown, pending, or reverted.
    #[error("transaction failed on-chain")]
    TxFailed {
        /// The offending transaction.
        tx_hash: TxHash,
    },
    /// The transaction emitted no transfer of the settlement asset.
    #[error("no transfer found in transaction")]
    TransferNotFound {
        /// The offending transaction.
        tx_hash: TxHash,
    },
    /// The transfer paid someone other than the configured recipient.
    #[error("payment sent to wrong address")]
    WrongRecipient {
        /// Configured recipient.
        expected: Address,
        /// Destination of the transfer.
        actual: Address,
    },
    /// The transfer paid less than the price.
    #[error("insufficient payment: paid {paid}, required {required}")]
    InsufficientAmount {
        /// Amount transferred.
        paid: Decimal,
        /// Configured price.
        required: Decimal,
    },
    /// The ledger could not be queried.
    #[error("failed to verify transaction network")]
    Network(#[source] LedgerError),
}

impl VerificationError {
    /// Returns `true` when the failure comes from the ledger rather than the payment.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<LedgerError> for VerificationError {
    fn from(value: LedgerError) -> Self {
        Self::Network(value)
    }
}

/// Outcome of verifying one payment proof.
pub type VerificationResult = Result<VerifiedPayment, VerificationError>;

/// Verifies payment proofs against a [`Ledger`].
#[derive(Debug, Clone)]
pub struct PaymentVerifier<L> {
    ledger: L,
    asset: SettlementAsset,
}

impl<L> PaymentVerifier<L> {
    /// Creates a verifier accepting transfers of `asset`.
    #[must_use]
    pub const fn new(ledger: L, asset: SettlementAsset) -> Self {
        Self { ledger, asset }
    }

    /// Returns the underlying ledger.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the settlement asset.
    #[must_use]
    pub const fn asset(&self) -> &SettlementAsset {
        &self.asset
    }
}

impl<L: Ledger> PaymentVerifier<L> {
    /// Verifies that `tx_hash` paid `recipient` at least `required` units of the asset.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] describing the first failed check. Ledger
    /// failures of any kind surface as [`VerificationError::Network`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "turnstile.verify", skip_all, err, fields(tx = %tx_hash))
    )]
    pub async fn verify(
        &self,
        tx_hash: &TxHash,
        recipient: Address,
        required: Decimal,
    ) -> VerificationResult {
        let receipt = self.ledger.receipt(tx_hash).await?;
        let block = match receipt {
            Some(receipt) if receipt.success => receipt.block_number,
            _ => None,
        }
        .ok_or(VerificationError::TxFailed { tx_hash: *tx_hash })?;

        let transfers = self
            .ledger
            .transfers(self.asset.address, block, block)
            .await?;
        let transfer = self.select_transfer(&transfers, tx_hash, recipient, required)?;

        Ok(VerifiedPayment {
            tx_hash: *tx_hash,
            payer: transfer.from,
            value: transfer.value,
        })
    }

    /// Picks the transfer of `tx_hash` that pays `recipient` at least `required`.
    ///
    /// When several transfers pay the recipient, the first one covering the
    /// price wins. If none does, the largest is reported as insufficient.
    fn select_transfer<'a>(
        &self,
        transfers: &'a [TransferEvent],
        tx_hash: &TxHash,
        recipient: Address,
        required: Decimal,
    ) -> Result<&'a TransferEvent, VerificationError> {
        let mut own = transfers.iter().filter(|t| t.tx_hash == *tx_hash).peekable();
        let first = own
            .peek()
            .copied()
            .ok_or(VerificationError::TransferNotFound { tx_hash: *tx_hash })?;

        let mut largest: Option<Decimal> = None;
        for transfer in own.filter(|t| t.to == recipient) {
            // Amounts beyond the decimal range are larger than any configurable price.
            let Some(paid) = self.asset.to_decimal(transfer.value) else {
                return Ok(transfer);
            };
            if paid >= required {
                return Ok(transfer);
            }
            if largest.is_none_or(|max| paid > max) {
                largest = Some(paid);
            }
        }

        match largest {
            Some(paid) => Err(VerificationError::InsufficientAmount {
                paid: paid.normalize(),
                required: required.normalize(),
            }),
            None => Err(VerificationError::WrongRecipient {
                expected: recipient,
                actual: first.to,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ledger::{BoxFuture, TxReceipt};
    use alloy_primitives::{address, b256};
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const RECIPIENT: Address = address!("5569A8d923f114455DeF7ae9731E26B9B8EA1D36");
    pub(crate) const PAYER: Address = address!("1111111111111111111111111111111111111111");
    pub(crate) const TX: TxHash =
        b256!("a3c1f8e2d4b5a6978877665544332211ffeeddccbbaa99887766554433221100");

    /// In-memory ledger for tests.
    #[derive(Default)]
    pub(crate) struct FakeLedger {
        pub receipts: Mutex<HashMap<TxHash, TxReceipt>>,
        pub transfers: Mutex<Vec<(u64, Address, TransferEvent)>>,
        pub offline: bool,
        pub receipt_calls: AtomicUsize,
    }

    impl FakeLedger {
        /// Records a settled transfer of USDC on Base in `block`.
        pub fn settle(&self, tx_hash: TxHash, block: u64, from: Address, to: Address, raw: u64) {
            self.receipts.lock().unwrap().insert(
                tx_hash,
                TxReceipt {
                    tx_hash,
                    block_number: Some(block),
                    success: true,
                },
            );
            self.transfers.lock().unwrap().push((
                block,
                SettlementAsset::USDC_ON_BASE.address,
                TransferEvent {
                    tx_hash,
                    from,
                    to,
                    value: U256::from(raw),
                },
            ));
        }

        pub fn offline() -> Self {
            Self {
                offline: true,
                ..Self::default()
            }
        }
    }

    impl Ledger for FakeLedger {
        fn receipt<'a>(
            &'a self,
            tx_hash: &'a TxHash,
        ) -> BoxFuture<'a, Result<Option<TxReceipt>, LedgerError>> {
            self.receipt_calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.offline {
                Err(LedgerError::Transport("connection refused".into()))
            } else {
                Ok(self.receipts.lock().unwrap().get(tx_hash).copied())
            };
            Box::pin(async move {
                tokio::task::yield_now().await;
                result
            })
        }

        fn transfers(
            &self,
            token: Address,
            from_block: u64,
            to_block: u64,
        ) -> BoxFuture<'_, Result<Vec<TransferEvent>, LedgerError>> {
            let events = self
                .transfers
                .lock()
                .unwrap()
                .iter()
                .filter(|(block, contract, _)| {
                    *contract == token && (from_block..=to_block).contains(block)
                })
                .map(|(_, _, event)| *event)
                .collect();
            Box::pin(async move { Ok(events) })
        }
    }

    fn verifier(ledger: FakeLedger) -> PaymentVerifier<FakeLedger> {
        PaymentVerifier::new(ledger, SettlementAsset::USDC_ON_BASE)
    }

    fn price() -> Decimal {
        Decimal::from_str("0.01").unwrap()
    }

    #[tokio::test]
    async fn test_exact_payment_is_valid() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 10_000);
        let payment = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap();
        assert_eq!(payment.payer, PAYER);
        assert_eq!(payment.value, U256::from(10_000u64));
    }

    #[tokio::test]
    async fn test_overpayment_is_valid() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 50_000);
        assert!(verifier(ledger).verify(&TX, RECIPIENT, price()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_transaction_failed() {
        let err = verifier(FakeLedger::default())
            .verify(&TX, RECIPIENT, price())
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::TxFailed { .. }));
        assert_eq!(err.to_string(), "transaction failed on-chain");
    }

    #[tokio::test]
    async fn test_reverted_transaction_failed() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 10_000);
        ledger.receipts.lock().unwrap().get_mut(&TX).unwrap().success = false;
        let err = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap_err();
        assert!(matches!(err, VerificationError::TxFailed { .. }));
    }

    #[tokio::test]
    async fn test_pending_transaction_failed() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 10_000);
        ledger.receipts.lock().unwrap().get_mut(&TX).unwrap().block_number = None;
        let err = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap_err();
        assert!(matches!(err, VerificationError::TxFailed { .. }));
    }

    #[tokio::test]
    async fn test_transfer_of_other_transaction_is_ignored() {
        let ledger = FakeLedger::default();
        let other = b256!("00000000000000000000000000000000000000000000000000000000000000ff");
        ledger.settle(other, 100, PAYER, RECIPIENT, 10_000);
        ledger.receipts.lock().unwrap().insert(
            TX,
            TxReceipt {
                tx_hash: TX,
                block_number: Some(100),
                success: true,
            },
        );
        let err = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap_err();
        assert!(matches!(err, VerificationError::TransferNotFound { .. }));
        assert_eq!(err.to_string(), "no transfer found in transaction");
    }

    #[tokio::test]
    async fn test_wrong_recipient() {
        let ledger = FakeLedger::default();
        let stranger = address!("2222222222222222222222222222222222222222");
        ledger.settle(TX, 100, PAYER, stranger, 10_000);
        let err = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap_err();
        assert!(matches!(
            err,
            VerificationError::WrongRecipient { actual, .. } if actual == stranger
        ));
        assert_eq!(err.to_string(), "payment sent to wrong address");
    }

    #[tokio::test]
    async fn test_recipient_transfer_found_among_several() {
        let ledger = FakeLedger::default();
        let stranger = address!("2222222222222222222222222222222222222222");
        ledger.settle(TX, 100, PAYER, stranger, 1);
        ledger.settle(TX, 100, PAYER, RECIPIENT, 10_000);
        assert!(verifier(ledger).verify(&TX, RECIPIENT, price()).await.is_ok());
    }

    #[tokio::test]
    async fn test_dust_before_full_payment_is_valid() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 1);
        ledger.settle(TX, 100, PAYER, RECIPIENT, 10_000);
        let payment = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap();
        assert_eq!(payment.value, U256::from(10_000u64));
    }

    #[tokio::test]
    async fn test_several_short_transfers_report_the_largest() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 1);
        ledger.settle(TX, 100, PAYER, RECIPIENT, 5_000);
        ledger.settle(TX, 100, PAYER, RECIPIENT, 20);
        let err = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient payment: paid 0.005, required 0.01"
        );
    }

    #[tokio::test]
    async fn test_amount_beyond_decimal_range_is_valid() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 0);
        ledger.transfers.lock().unwrap()[0].2.value = U256::MAX;
        let payment = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap();
        assert_eq!(payment.value, U256::MAX);
        assert_eq!(payment.payer, PAYER);
    }

    #[tokio::test]
    async fn test_insufficient_payment_reports_both_amounts() {
        let ledger = FakeLedger::default();
        ledger.settle(TX, 100, PAYER, RECIPIENT, 9_900);
        let err = verifier(ledger).verify(&TX, RECIPIENT, price()).await.unwrap_err();
        assert!(matches!(err, VerificationError::InsufficientAmount { .. }));
        assert_eq!(
            err.to_string(),
            "insufficient payment: paid 0.0099, required 0.01"
        );
    }

    #[tokio::test]
    async fn test_ledger_failure_is_network_error() {
        let err = verifier(FakeLedger::offline())
            .verify(&TX, RECIPIENT, price())
            .await
            .unwrap_err();
        assert!(err.is_infrastructure());
        assert_eq!(err.to_string(), "failed to verify transaction network");
    }
}
