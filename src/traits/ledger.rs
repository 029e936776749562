//! Currency transfer abstraction.

use anyhow::Result;
use async_trait::async_trait;

use crate::ids::ParticipantId;

/// Atomic currency movement between participant accounts.
///
/// A transfer either fully succeeds or fully fails; there is no partial
/// state. The engines map failures from this seam into
/// `MarketError::Transfer` and roll back any staged effects.
#[async_trait]
pub trait CurrencyLedger: Send + Sync + Clone {
    /// Move `amount` from `from` to `to`.
    async fn transfer(&self, from: &ParticipantId, to: &ParticipantId, amount: u64) -> Result<()>;
}
