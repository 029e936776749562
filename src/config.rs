//! Policy parameters and configuration constants for the marketplace.
//!
//! Everything a deployment might tune lives in [`MarketPolicy`]; nothing in
//! the engines hard-codes a fee, a duration bound or the royalty cap.

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};

/// Basis-point denominator used for royalty math.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// One hour in seconds.
pub const SECS_PER_HOUR: u64 = 3_600;

/// One day in seconds.
pub const SECS_PER_DAY: u64 = 86_400;

/// Tunable policy parameters for listings, offers and auctions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPolicy {
    /// Flat fee collected when an asset is listed or relisted.
    pub listing_fee: u64,

    /// Flat fee collected when an auction is created.
    pub auction_fee: u64,

    /// Minimum lifetime of a negotiated offer, in seconds.
    pub min_offer_duration: u64,

    /// Maximum lifetime of a negotiated offer, in seconds.
    pub max_offer_duration: u64,

    /// Minimum auction duration, in seconds.
    pub min_auction_duration: u64,

    /// Maximum auction duration, in seconds.
    pub max_auction_duration: u64,

    /// Length of the sealed-bid commit phase, in seconds.
    pub commit_window: u64,

    /// Length of the sealed-bid reveal phase, in seconds.
    pub reveal_window: u64,

    /// Upper bound on royalties, in basis points of the sale amount.
    /// A registry-reported royalty above this is clamped, never honored.
    pub royalty_cap_bps: u64,
}

impl Default for MarketPolicy {
    fn default() -> Self {
        Self {
            listing_fee: 0,
            auction_fee: 0,
            min_offer_duration: SECS_PER_HOUR,
            max_offer_duration: 7 * SECS_PER_DAY,
            min_auction_duration: 60,
            max_auction_duration: 30 * SECS_PER_DAY,
            commit_window: SECS_PER_HOUR,
            reveal_window: SECS_PER_HOUR,
            royalty_cap_bps: 1_000, // 10%
        }
    }
}

impl MarketPolicy {
    /// Validate an offer duration against the policy window.
    pub fn check_offer_duration(&self, duration: u64) -> MarketResult<()> {
        if duration < self.min_offer_duration || duration > self.max_offer_duration {
            return Err(MarketError::InvalidDuration {
                actual: duration,
                min: self.min_offer_duration,
                max: self.max_offer_duration,
            });
        }
        Ok(())
    }

    /// Validate an auction duration against the policy window.
    pub fn check_auction_duration(&self, duration: u64) -> MarketResult<()> {
        if duration < self.min_auction_duration || duration > self.max_auction_duration {
            return Err(MarketError::InvalidDuration {
                actual: duration,
                min: self.min_auction_duration,
                max: self.max_auction_duration,
            });
        }
        Ok(())
    }
}
