//! Royalty Calculator: capability probe on the Asset Registry plus the
//! policy cap.
//!
//! The registry is the authority on who receives royalties and how much;
//! this module only clamps what it reports. A registry without royalty
//! support yields a zero royalty, logged as an explicit decision rather
//! than surfaced as an error.

use tracing::{debug, warn};

use crate::config::{MarketPolicy, BPS_DENOMINATOR};
use crate::error::MarketResult;
use crate::ids::AssetKey;
use crate::traits::{AssetRegistry, RoyaltySplit};

/// Compute the royalty deduction for a sale of `sale_amount`.
///
/// Returns `None` when no royalty applies: the registry lacks the
/// capability, reports no receiver, or reports a zero amount. The returned
/// amount is clamped to `policy.royalty_cap_bps` of the sale amount and to
/// the sale amount itself, so it can never exceed what is being paid.
pub async fn compute<R: AssetRegistry>(
    registry: &R,
    policy: &MarketPolicy,
    asset: &AssetKey,
    sale_amount: u64,
) -> MarketResult<Option<RoyaltySplit>> {
    let reported = registry.royalty_info(asset, sale_amount).await?;

    let Some(mut split) = reported else {
        debug!(%asset, "registry reports no royalty support, treating as zero");
        return Ok(None);
    };

    if split.amount == 0 {
        return Ok(None);
    }

    // The sale amount bounds the deduction even if the policy cap is
    // configured above 100%.
    let cap = capped_amount(sale_amount, policy.royalty_cap_bps).min(sale_amount);
    if split.amount > cap {
        warn!(
            %asset,
            reported = split.amount,
            cap,
            "registry royalty exceeds allowed maximum, clamping"
        );
        split.amount = cap;
    }

    Ok(Some(split))
}

/// Largest royalty the policy allows for a given sale amount.
fn capped_amount(sale_amount: u64, cap_bps: u64) -> u64 {
    ((sale_amount as u128 * cap_bps as u128) / BPS_DENOMINATOR as u128) as u64
}
