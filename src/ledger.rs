//! In-memory gas and nonce accounting.
//!
//! The gateway keeps exactly two pieces of shared mutable state: the gas
//! accumulated by admissions in the current block and the pending nonce per
//! sender. Both live behind one async mutex inside [`Ledger`], shared
//! between the request handlers and the block watcher.
//!
//! Admission is the critical section: the allowance read, the comparison,
//! and the counter increment happen under one lock acquisition, so two
//! concurrent relays can never both pass the same remaining allowance.
//! Because the chain is consulted while the lock is held, that read is
//! bounded by [`ALLOWANCE_TIMEOUT`].

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::chain::ChainError;

/// Bound on the allowance read performed while the ledger lock is held.
const ALLOWANCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a gas admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The counter was incremented; the caller may submit.
    Allowed,
    /// The projected block gas exceeds the node allowance; the counter is
    /// unchanged.
    Rejected,
}

#[derive(Debug, Default)]
struct LedgerState {
    block_gas: u64,
    pending_nonces: HashMap<Address, u64>,
}

/// Process-wide gas and nonce ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to admit `wrapper_gas` into the current block.
    ///
    /// `allowance` is queried inside the critical section so the check and
    /// the increment are atomic with respect to concurrent admissions. On
    /// [`Admission::Rejected`] the counter keeps its pre-call value.
    pub async fn admit<F, Fut>(&self, wrapper_gas: u64, allowance: F) -> Result<Admission, ChainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<U256, ChainError>>,
    {
        let mut state = self.state.lock().await;
        let allowance = tokio::time::timeout(ALLOWANCE_TIMEOUT, allowance())
            .await
            .map_err(|_| ChainError::AllowanceTimeout)??;
        let projected = state.block_gas.saturating_add(wrapper_gas);
        if U256::from(projected) > allowance {
            tracing::warn!(
                wrapper_gas,
                in_block = state.block_gas,
                %allowance,
                "meta-transaction does not fit the node gas allowance"
            );
            return Ok(Admission::Rejected);
        }
        state.block_gas = projected;
        tracing::info!(gas_used = state.block_gas, "gas accumulated in current block");
        Ok(Admission::Allowed)
    }

    /// Zeroes the block gas accumulator. Called by the watcher on each new
    /// head.
    pub async fn reset_block_gas(&self) {
        let mut state = self.state.lock().await;
        state.block_gas = 0;
        tracing::debug!("block gas accumulator reset");
    }

    /// Gas admitted since the last reset.
    pub async fn block_gas(&self) -> u64 {
        self.state.lock().await.block_gas
    }

    /// Records a successfully submitted nonce for `sender`.
    ///
    /// First submission stores `nonce` itself; any later submission at or
    /// above the stored value advances it by exactly one. A stale nonce is
    /// ignored, so the stored value never decreases.
    pub async fn mark_submitted(&self, sender: Address, nonce: u64) {
        let mut state = self.state.lock().await;
        match state.pending_nonces.get_mut(&sender) {
            Some(current) if nonce >= *current => *current += 1,
            Some(_) => {}
            None => {
                state.pending_nonces.insert(sender, nonce);
            }
        }
    }

    /// Pending nonce for `sender`, if any relay has been accepted since
    /// startup.
    pub async fn pending_nonce(&self, sender: Address) -> Option<u64> {
        self.state.lock().await.pending_nonces.get(&sender).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const SENDER: Address = address!("d00e6624a73f88b39f82ab34e8bf2b4d226fd768");

    fn allowance(value: u64) -> impl Fn() -> std::future::Ready<Result<U256, ChainError>> {
        move || std::future::ready(Ok(U256::from(value)))
    }

    #[tokio::test]
    async fn admits_within_allowance() {
        let ledger = Ledger::new();
        let admission = ledger.admit(200_000, allowance(1_000_000)).await.unwrap();
        assert_eq!(admission, Admission::Allowed);
        assert_eq!(ledger.block_gas().await, 200_000);
    }

    #[tokio::test]
    async fn rejects_over_allowance_without_counting() {
        let ledger = Ledger::new();
        let admission = ledger.admit(200_000, allowance(100_000)).await.unwrap();
        assert_eq!(admission, Admission::Rejected);
        assert_eq!(ledger.block_gas().await, 0);
    }

    #[tokio::test]
    async fn accumulates_until_the_allowance_is_spent() {
        let ledger = Ledger::new();
        assert_eq!(ledger.admit(60_000, allowance(100_000)).await.unwrap(), Admission::Allowed);
        assert_eq!(ledger.admit(40_000, allowance(100_000)).await.unwrap(), Admission::Allowed);
        assert_eq!(ledger.admit(1, allowance(100_000)).await.unwrap(), Admission::Rejected);
        assert_eq!(ledger.block_gas().await, 100_000);
    }

    #[tokio::test]
    async fn reset_reopens_the_block() {
        let ledger = Ledger::new();
        ledger.admit(90_000, allowance(100_000)).await.unwrap();
        ledger.reset_block_gas().await;
        assert_eq!(ledger.block_gas().await, 0);
        assert_eq!(ledger.admit(90_000, allowance(100_000)).await.unwrap(), Admission::Allowed);
    }

    #[tokio::test]
    async fn concurrent_admissions_cannot_both_pass() {
        let ledger = std::sync::Arc::new(Ledger::new());
        let (first, second) = tokio::join!(
            ledger.admit(60_000, allowance(100_000)),
            ledger.admit(60_000, allowance(100_000)),
        );
        let admitted = [first.unwrap(), second.unwrap()]
            .into_iter()
            .filter(|outcome| *outcome == Admission::Allowed)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(ledger.block_gas().await, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_allowance_read_times_out() {
        let ledger = Ledger::new();
        let err = ledger
            .admit(1, || std::future::pending::<Result<U256, ChainError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::AllowanceTimeout));
        assert_eq!(ledger.block_gas().await, 0);
    }

    #[tokio::test]
    async fn first_submission_stores_the_nonce() {
        let ledger = Ledger::new();
        assert_eq!(ledger.pending_nonce(SENDER).await, None);
        ledger.mark_submitted(SENDER, 34).await;
        assert_eq!(ledger.pending_nonce(SENDER).await, Some(34));
    }

    #[tokio::test]
    async fn resubmission_advances_by_one() {
        let ledger = Ledger::new();
        ledger.mark_submitted(SENDER, 34).await;
        ledger.mark_submitted(SENDER, 34).await;
        assert_eq!(ledger.pending_nonce(SENDER).await, Some(35));
    }

    #[tokio::test]
    async fn sequential_submissions_track_the_client() {
        let ledger = Ledger::new();
        for nonce in 34..45 {
            ledger.mark_submitted(SENDER, nonce).await;
            assert_eq!(ledger.pending_nonce(SENDER).await, Some(nonce));
        }
    }

    #[tokio::test]
    async fn skipped_nonces_only_advance_by_one() {
        // A client jumping from 34 to 40 leaves the ledger at 35; the
        // divergence from chain state is accepted.
        let ledger = Ledger::new();
        ledger.mark_submitted(SENDER, 34).await;
        ledger.mark_submitted(SENDER, 40).await;
        assert_eq!(ledger.pending_nonce(SENDER).await, Some(35));
    }

    #[tokio::test]
    async fn stale_nonce_is_ignored() {
        let ledger = Ledger::new();
        ledger.mark_submitted(SENDER, 34).await;
        ledger.mark_submitted(SENDER, 34).await;
        ledger.mark_submitted(SENDER, 10).await;
        assert_eq!(ledger.pending_nonce(SENDER).await, Some(35));
    }

    #[tokio::test]
    async fn senders_are_tracked_independently() {
        let other = address!("a20aa371a9d05bba5d087bfee8fdf47ffe1088da");
        let ledger = Ledger::new();
        ledger.mark_submitted(SENDER, 34).await;
        ledger.mark_submitted(other, 7).await;
        assert_eq!(ledger.pending_nonce(SENDER).await, Some(34));
        assert_eq!(ledger.pending_nonce(other).await, Some(7));
    }
}
