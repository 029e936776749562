//! In-memory currency ledger with failure injection.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ids::ParticipantId;
use crate::traits::CurrencyLedger;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<ParticipantId, u64>,
    /// When true, every transfer fails.
    fail_all: bool,
    /// Countdown: `Some(n)` fails the (n+1)-th transfer from now, once.
    fail_after: Option<u64>,
    /// Every successful transfer, in order.
    transfers: Vec<(ParticipantId, ParticipantId, u64)>,
}

/// Mock ledger collaborator.
///
/// `fail_after(n)` lets a test allow the first `n` transfers of an
/// operation through and reject the next one, which is how the rollback
/// paths are exercised mid-settlement.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    inner: Arc<RwLock<LedgerState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add funds to an account out of thin air.
    pub fn credit(&self, who: &ParticipantId, amount: u64) {
        let mut state = self.inner.write();
        *state.balances.entry(*who).or_insert(0) += amount;
    }

    /// Current balance of an account.
    pub fn balance(&self, who: &ParticipantId) -> u64 {
        self.inner.read().balances.get(who).copied().unwrap_or(0)
    }

    /// Make every subsequent transfer fail.
    pub fn set_fail_transfers(&self, fail: bool) {
        self.inner.write().fail_all = fail;
    }

    /// Let the next `n` transfers succeed, then fail one.
    pub fn fail_after(&self, n: u64) {
        self.inner.write().fail_after = Some(n);
    }

    /// Number of successful transfers so far.
    pub fn transfer_count(&self) -> usize {
        self.inner.read().transfers.len()
    }

    /// Successful transfers in order, for assertions on payout ordering.
    pub fn transfers(&self) -> Vec<(ParticipantId, ParticipantId, u64)> {
        self.inner.read().transfers.clone()
    }
}

#[async_trait]
impl CurrencyLedger for MockLedger {
    async fn transfer(&self, from: &ParticipantId, to: &ParticipantId, amount: u64) -> Result<()> {
        let mut state = self.inner.write();
        if state.fail_all {
            bail!("ledger unavailable");
        }
        if let Some(countdown) = state.fail_after {
            if countdown == 0 {
                state.fail_after = None;
                bail!("transfer rejected by recipient");
            }
            state.fail_after = Some(countdown - 1);
        }
        let from_balance = state.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            bail!("insufficient funds: {from} has {from_balance}, needs {amount}");
        }
        state.balances.insert(*from, from_balance - amount);
        *state.balances.entry(*to).or_insert(0) += amount;
        state.transfers.push((*from, *to, amount));
        Ok(())
    }
}
