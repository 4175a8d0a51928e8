//! Ledger-query interface consumed by the payment verifier.
//!
//! A [`Ledger`] answers two questions about the chain: "what is the receipt of
//! this transaction" and "which transfers of this token happened in these
//! blocks". Implementations live outside this crate (see `turnstile-evm`).

use std::future::Future;
use std::pin::Pin;

use alloy_primitives::{Address, TxHash, U256};

use crate::error::LedgerError;

/// Boxed future returned by dyn-compatible async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Settlement receipt of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// Hash of the transaction.
    pub tx_hash: TxHash,
    /// Block the transaction was included in, `None` while pending.
    pub block_number: Option<u64>,
    /// Whether the transaction executed successfully.
    pub success: bool,
}

/// An ERC-20 `Transfer` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvent {
    /// Hash of the transaction that emitted the event.
    pub tx_hash: TxHash,
    /// Sender of the tokens.
    pub from: Address,
    /// Receiver of the tokens.
    pub to: Address,
    /// Raw token amount, in the token's smallest unit.
    pub value: U256,
}

/// Read access to a blockchain.
pub trait Ledger: Send + Sync {
    /// Fetches the receipt of a transaction, `None` if the transaction is unknown.
    fn receipt<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<Option<TxReceipt>, LedgerError>>;

    /// Fetches `Transfer` events emitted by `token` within the inclusive block range.
    fn transfers(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> BoxFuture<'_, Result<Vec<TransferEvent>, LedgerError>>;
}

impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    fn receipt<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<Option<TxReceipt>, LedgerError>> {
        (**self).receipt(tx_hash)
    }

    fn transfers(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> BoxFuture<'_, Result<Vec<TransferEvent>, LedgerError>> {
        (**self).transfers(token, from_block, to_block)
    }
}
