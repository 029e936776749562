//! In-memory Asset Registry with owner records, custody authorizations and
//! per-collection royalty configuration.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::BPS_DENOMINATOR;
use crate::events::{EventLog, MarketEvent};
use crate::ids::{AssetKey, CollectionId, ParticipantId};
use crate::traits::{AssetRegistry, RoyaltySplit};

#[derive(Debug, Default)]
struct RegistryState {
    owners: HashMap<AssetKey, ParticipantId>,
    /// (owner, operator) pairs with custody authorization.
    authorizations: HashSet<(ParticipantId, ParticipantId)>,
    /// Per-collection royalty: receiver and basis points of the sale amount.
    royalties: HashMap<CollectionId, (ParticipantId, u64)>,
    /// When false, `royalty_info` reports the capability as absent.
    royalty_supported: bool,
    /// When true, every custody transfer is rejected (rollback tests).
    fail_transfers: bool,
}

/// Mock Asset Registry collaborator.
#[derive(Debug, Clone)]
pub struct MockAssetRegistry {
    inner: Arc<RwLock<RegistryState>>,
    events: Option<EventLog>,
}

impl MockAssetRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryState {
                royalty_supported: true,
                ..RegistryState::default()
            })),
            events: None,
        }
    }

    /// Attach a shared event log; royalty configuration changes are then
    /// recorded into the same stream the engines write to.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Create an asset owned by `owner`.
    pub fn mint(&self, asset: AssetKey, owner: ParticipantId) {
        self.inner.write().owners.insert(asset, owner);
    }

    /// Grant or revoke custody authorization for an operator.
    pub fn set_authorization(&self, owner: ParticipantId, operator: ParticipantId, allowed: bool) {
        let mut state = self.inner.write();
        if allowed {
            state.authorizations.insert((owner, operator));
        } else {
            state.authorizations.remove(&(owner, operator));
        }
    }

    /// Configure the royalty for a collection.
    pub fn set_royalty(&self, collection: CollectionId, receiver: ParticipantId, bps: u64) {
        self.inner.write().royalties.insert(collection, (receiver, bps));
        if let Some(events) = &self.events {
            events.record(MarketEvent::RoyaltySet {
                collection,
                receiver,
                bps,
            });
        }
    }

    /// Toggle whether the registry advertises royalty support at all.
    pub fn set_royalty_supported(&self, supported: bool) {
        self.inner.write().royalty_supported = supported;
    }

    /// Make every subsequent custody transfer fail.
    pub fn set_fail_transfers(&self, fail: bool) {
        self.inner.write().fail_transfers = fail;
    }

    /// Current owner, if the asset exists.
    pub fn owner(&self, asset: &AssetKey) -> Option<ParticipantId> {
        self.inner.read().owners.get(asset).copied()
    }
}

impl Default for MockAssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetRegistry for MockAssetRegistry {
    async fn owner_of(&self, asset: &AssetKey) -> Result<ParticipantId> {
        match self.inner.read().owners.get(asset) {
            Some(owner) => Ok(*owner),
            None => bail!("unknown asset {asset}"),
        }
    }

    async fn is_custody_authorized(
        &self,
        owner: &ParticipantId,
        operator: &ParticipantId,
    ) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .authorizations
            .contains(&(*owner, *operator)))
    }

    async fn transfer_custody(
        &self,
        from: &ParticipantId,
        to: &ParticipantId,
        asset: &AssetKey,
    ) -> Result<()> {
        let mut state = self.inner.write();
        if state.fail_transfers {
            bail!("custody transfer rejected by registry");
        }
        match state.owners.get(asset) {
            Some(owner) if owner == from => {
                state.owners.insert(*asset, *to);
                Ok(())
            }
            Some(_) => bail!("{from} is not the owner of {asset}"),
            None => bail!("unknown asset {asset}"),
        }
    }

    async fn royalty_info(
        &self,
        asset: &AssetKey,
        sale_amount: u64,
    ) -> Result<Option<RoyaltySplit>> {
        let state = self.inner.read();
        if !state.royalty_supported {
            return Ok(None);
        }
        Ok(state.royalties.get(&asset.collection).map(|(receiver, bps)| {
            RoyaltySplit {
                receiver: *receiver,
                amount: ((sale_amount as u128 * *bps as u128) / BPS_DENOMINATOR as u128) as u64,
            }
        }))
    }
}
