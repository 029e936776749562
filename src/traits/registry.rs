//! Asset Registry abstraction: the sole authority on asset ownership.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::{AssetKey, ParticipantId};

/// A royalty deduction reported by the registry for a given sale amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltySplit {
    /// Who receives the royalty.
    pub receiver: ParticipantId,
    /// Deduction from the sale amount, in the same currency units.
    pub amount: u64,
}

/// Abstraction over the external Asset Registry collaborator.
///
/// The marketplace never asserts ownership beyond what this registry
/// reports at call time. Custody moves through `transfer_custody`; the
/// royalty lookup is an optional capability, probed rather than assumed.
#[async_trait]
pub trait AssetRegistry: Send + Sync + Clone {
    /// Current owner of record for an asset.
    ///
    /// Errors if the asset is unknown to the registry.
    async fn owner_of(&self, asset: &AssetKey) -> Result<ParticipantId>;

    /// Whether `operator` is pre-authorized to move assets owned by `owner`.
    async fn is_custody_authorized(
        &self,
        owner: &ParticipantId,
        operator: &ParticipantId,
    ) -> Result<bool>;

    /// Move custody of an asset from `from` to `to`.
    ///
    /// Either fully succeeds or fully fails; the registry enforces that
    /// `from` is the current owner of record.
    async fn transfer_custody(
        &self,
        from: &ParticipantId,
        to: &ParticipantId,
        asset: &AssetKey,
    ) -> Result<()>;

    /// Royalty lookup for a sale of `sale_amount`.
    ///
    /// Returns `Ok(None)` when the registry does not support royalties for
    /// this asset — an absent capability is a first-class outcome, not an
    /// error.
    async fn royalty_info(&self, asset: &AssetKey, sale_amount: u64)
        -> Result<Option<RoyaltySplit>>;
}
