//! Replay protection for payment proofs.
//!
//! A payment proof may be exchanged for a credential exactly once. The
//! [`ReplayGuard`] trait is the seam for the redeemed-proof store: the
//! in-process [`MemoryReplayGuard`] is the default, and deployments running
//! several gate processes must inject a shared store instead.

use std::sync::Arc;

use alloy_primitives::TxHash;
use dashmap::DashSet;

use crate::error::ReplayGuardError;
use crate::ledger::BoxFuture;

/// Store of payment proofs that have already been redeemed.
pub trait ReplayGuard: Send + Sync {
    /// Returns whether `tx_hash` has already been redeemed.
    fn is_redeemed<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<bool, ReplayGuardError>>;

    /// Marks `tx_hash` as redeemed.
    ///
    /// Must be an atomic insert-if-absent: returns `true` only for the single
    /// call that performed the insertion. Marking an already redeemed proof is
    /// a no-op returning `false`.
    fn mark_redeemed<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<bool, ReplayGuardError>>;
}

impl<T: ReplayGuard + ?Sized> ReplayGuard for Arc<T> {
    fn is_redeemed<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<bool, ReplayGuardError>> {
        (**self).is_redeemed(tx_hash)
    }

    fn mark_redeemed<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<bool, ReplayGuardError>> {
        (**self).mark_redeemed(tx_hash)
    }
}

/// Process-local redeemed-proof set.
///
/// Backed by a sharded concurrent set, so marking one transaction never waits
/// on marking an unrelated one. The set only grows.
#[derive(Debug, Clone, Default)]
pub struct MemoryReplayGuard {
    redeemed: Arc<DashSet<TxHash>>,
}

impl MemoryReplayGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of redeemed proofs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.redeemed.len()
    }

    /// Returns `true` if nothing has been redeemed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.redeemed.is_empty()
    }
}

impl ReplayGuard for MemoryReplayGuard {
    fn is_redeemed<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<bool, ReplayGuardError>> {
        let redeemed = self.redeemed.contains(tx_hash);
        Box::pin(async move { Ok(redeemed) })
    }

    fn mark_redeemed<'a>(
        &'a self,
        tx_hash: &'a TxHash,
    ) -> BoxFuture<'a, Result<bool, ReplayGuardError>> {
        let inserted = self.redeemed.insert(*tx_hash);
        Box::pin(async move { Ok(inserted) })
    }
}
