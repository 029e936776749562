//! Escrow & Payout Engine: custody of funds and assets during settlement.
//!
//! The engine owns no listings or auctions; it moves value on their behalf
//! through the collaborator seams and enforces the two shared disciplines:
//! a per-asset mutual-exclusion lock held for the whole operation, and
//! checks-effects-interactions ordering on every settlement path. A
//! multi-step settlement records each completed external step so that a
//! later failure can unwind the earlier ones and the whole operation
//! aborts as a unit.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::config::MarketPolicy;
use crate::error::{MarketError, MarketResult};
use crate::events::EventLog;
use crate::ids::{AssetKey, ParticipantId};
use crate::royalty;
use crate::traits::{AssetRegistry, CurrencyLedger, RoyaltySplit};

/// Per-asset mutual-exclusion locks.
///
/// A lock is acquired for the full duration of one operation and released
/// on every exit path, so nested or concurrent invocations against the
/// same asset are serialized rather than interleaved mid-settlement.
#[derive(Debug, Clone, Default)]
pub struct AssetLocks {
    inner: Arc<RwLock<HashMap<AssetKey, Arc<Mutex<()>>>>>,
}

impl AssetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one asset, creating it on first use.
    pub async fn acquire(&self, asset: &AssetKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.write();
            map.entry(*asset)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

/// Pull-based refund balances, keyed by (asset, participant).
///
/// Outbid amounts and reveal surpluses accumulate here instead of being
/// pushed synchronously, so an uncooperative recipient cannot stall the
/// state transition that owed them the refund.
#[derive(Debug, Clone, Default)]
pub struct PendingReturns {
    inner: Arc<RwLock<HashMap<(AssetKey, ParticipantId), u64>>>,
}

impl PendingReturns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to a participant's refundable balance.
    pub fn credit(&self, asset: &AssetKey, participant: &ParticipantId, amount: u64) {
        if amount == 0 {
            return;
        }
        let mut map = self.inner.write();
        *map.entry((*asset, *participant)).or_insert(0) += amount;
    }

    /// Remove up to `amount` from a balance. Used only to roll back credits
    /// staged by an operation that subsequently failed.
    pub fn debit(&self, asset: &AssetKey, participant: &ParticipantId, amount: u64) {
        let mut map = self.inner.write();
        if let Some(balance) = map.get_mut(&(*asset, *participant)) {
            *balance = balance.saturating_sub(amount);
            if *balance == 0 {
                map.remove(&(*asset, *participant));
            }
        }
    }

    /// Take the entire balance, zeroing it before any transfer happens.
    pub fn take(&self, asset: &AssetKey, participant: &ParticipantId) -> u64 {
        self.inner
            .write()
            .remove(&(*asset, *participant))
            .unwrap_or(0)
    }

    /// Current refundable balance.
    pub fn balance(&self, asset: &AssetKey, participant: &ParticipantId) -> u64 {
        self.inner
            .read()
            .get(&(*asset, *participant))
            .copied()
            .unwrap_or(0)
    }
}

/// One completed external step of a settlement, recorded for unwind.
#[derive(Debug, Clone)]
enum Step {
    Funds { to: ParticipantId, amount: u64 },
    Asset { to: ParticipantId, asset: AssetKey },
}

/// Shared settlement primitives used by the listing book and both auction
/// houses.
///
/// Clones share the same locks and event log, so every engine built from
/// one `PayoutEngine` participates in the same per-asset exclusion and the
/// same ordered event stream.
#[derive(Debug, Clone)]
pub struct PayoutEngine<R, L>
where
    R: AssetRegistry,
    L: CurrencyLedger,
{
    registry: R,
    ledger: L,
    /// Account holding escrowed funds and asset custody during settlement.
    vault: ParticipantId,
    /// Account receiving listing and auction fees.
    fee_account: ParticipantId,
    policy: MarketPolicy,
    locks: AssetLocks,
    events: EventLog,
}

impl<R, L> PayoutEngine<R, L>
where
    R: AssetRegistry,
    L: CurrencyLedger,
{
    pub fn new(
        registry: R,
        ledger: L,
        vault: ParticipantId,
        fee_account: ParticipantId,
        policy: MarketPolicy,
        events: EventLog,
    ) -> Self {
        Self {
            registry,
            ledger,
            vault,
            fee_account,
            policy,
            locks: AssetLocks::new(),
            events,
        }
    }

    pub fn policy(&self) -> &MarketPolicy {
        &self.policy
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn vault(&self) -> ParticipantId {
        self.vault
    }

    /// Acquire the per-asset lock for the duration of one operation.
    pub async fn lock_asset(&self, asset: &AssetKey) -> OwnedMutexGuard<()> {
        self.locks.acquire(asset).await
    }

    /// Precondition check: `caller` owns the asset and has pre-authorized
    /// the vault to take custody of it.
    pub async fn expect_owner_and_authorized(
        &self,
        caller: &ParticipantId,
        asset: &AssetKey,
    ) -> MarketResult<()> {
        let owner = self
            .registry
            .owner_of(asset)
            .await
            .map_err(|e| MarketError::NotFound(format!("asset {asset}: {e}")))?;
        if owner != *caller {
            return Err(MarketError::NotOwner);
        }
        let authorized = self
            .registry
            .is_custody_authorized(&owner, &self.vault)
            .await?;
        if !authorized {
            return Err(MarketError::NotAuthorized);
        }
        Ok(())
    }

    /// Pull escrow funds in from a participant.
    pub async fn collect(&self, from: &ParticipantId, amount: u64) -> MarketResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger
            .transfer(from, &self.vault, amount)
            .await
            .map_err(|e| MarketError::Transfer(e.to_string()))
    }

    /// Pay a participant out of the vault's escrowed balance.
    pub async fn disburse(&self, to: &ParticipantId, amount: u64) -> MarketResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger
            .transfer(&self.vault, to, amount)
            .await
            .map_err(|e| MarketError::Transfer(e.to_string()))
    }

    /// Return previously collected escrow to its payer during a rollback.
    /// Failure here cannot abort anything further, so it is logged loudly
    /// instead of propagated.
    pub async fn refund_collected(&self, to: &ParticipantId, amount: u64) {
        if let Err(e) = self.disburse(to, amount).await {
            warn!(%to, amount, error = %e, "rollback refund could not be delivered");
        }
    }

    /// Collect a flat fee into the fee account. The caller has already
    /// verified that the attached payment equals the fee.
    pub async fn charge_fee(&self, from: &ParticipantId, amount: u64) -> MarketResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger
            .transfer(from, &self.fee_account, amount)
            .await
            .map_err(|e| MarketError::Transfer(e.to_string()))
    }

    /// Return a previously charged fee during a rollback.
    pub async fn refund_fee(&self, to: &ParticipantId, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Err(e) = self.ledger.transfer(&self.fee_account, to, amount).await {
            warn!(%to, amount, error = %e, "rollback fee refund could not be delivered");
        }
    }

    /// Take custody of an asset from its owner.
    pub async fn pull_asset(&self, owner: &ParticipantId, asset: &AssetKey) -> MarketResult<()> {
        self.registry
            .transfer_custody(owner, &self.vault, asset)
            .await
            .map_err(|e| MarketError::Custody(e.to_string()))
    }

    /// Release custody of an asset to a participant.
    pub async fn release_asset(&self, to: &ParticipantId, asset: &AssetKey) -> MarketResult<()> {
        self.registry
            .transfer_custody(&self.vault, to, asset)
            .await
            .map_err(|e| MarketError::Custody(e.to_string()))
    }

    /// Settle a sale: custody to the buyer, royalty to its receiver, the
    /// remainder to the seller, then any superseded-offer refunds — in
    /// that order. If any step fails, every completed step is unwound and
    /// the error is returned, so callers only have local effects left to
    /// roll back.
    pub async fn settle_sale(
        &self,
        asset: &AssetKey,
        seller: &ParticipantId,
        buyer: &ParticipantId,
        amount: u64,
        refunds: &[(ParticipantId, u64)],
    ) -> MarketResult<Option<RoyaltySplit>> {
        let split = royalty::compute(&self.registry, &self.policy, asset, amount).await?;
        let royalty_amount = split.as_ref().map_or(0, |s| s.amount);
        debug_assert!(royalty_amount <= amount);

        let mut steps: Vec<Step> = Vec::new();
        let outcome = self
            .run_settlement(asset, seller, buyer, amount, royalty_amount, &split, refunds, &mut steps)
            .await;

        match outcome {
            Ok(()) => {
                debug!(%asset, %seller, %buyer, amount, royalty = royalty_amount, "sale settled");
                Ok(split)
            }
            Err(err) => {
                self.unwind(&mut steps).await;
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_settlement(
        &self,
        asset: &AssetKey,
        seller: &ParticipantId,
        buyer: &ParticipantId,
        amount: u64,
        royalty_amount: u64,
        split: &Option<RoyaltySplit>,
        refunds: &[(ParticipantId, u64)],
        steps: &mut Vec<Step>,
    ) -> MarketResult<()> {
        self.release_asset(buyer, asset).await?;
        steps.push(Step::Asset {
            to: *buyer,
            asset: *asset,
        });

        if let Some(s) = split {
            self.disburse(&s.receiver, s.amount).await?;
            steps.push(Step::Funds {
                to: s.receiver,
                amount: s.amount,
            });
        }

        self.disburse(seller, amount - royalty_amount).await?;
        steps.push(Step::Funds {
            to: *seller,
            amount: amount - royalty_amount,
        });

        for (participant, refund) in refunds {
            self.disburse(participant, *refund).await?;
            steps.push(Step::Funds {
                to: *participant,
                amount: *refund,
            });
        }
        Ok(())
    }

    /// Reverse completed settlement steps, newest first. A production
    /// adapter maps this onto its host's transactional revert; the
    /// in-memory collaborators perform the reverse transfers directly.
    async fn unwind(&self, steps: &mut Vec<Step>) {
        while let Some(step) = steps.pop() {
            match step {
                Step::Funds { to, amount } => {
                    if let Err(e) = self.ledger.transfer(&to, &self.vault, amount).await {
                        warn!(%to, amount, error = %e, "settlement unwind: funds could not be reclaimed");
                    }
                }
                Step::Asset { to, asset } => {
                    if let Err(e) = self.registry.transfer_custody(&to, &self.vault, &asset).await
                    {
                        warn!(%to, %asset, error = %e, "settlement unwind: custody could not be reclaimed");
                    }
                }
            }
        }
    }
}
