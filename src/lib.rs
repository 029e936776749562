//! Peer-to-peer marketplace core for unique digital assets.
//!
//! Sellers escrow an asset with the vault and sell it at a fixed price,
//! through negotiated offers, in an open ascending auction or in a
//! sealed-bid commit-reveal auction. The crate owns the escrow-and-
//! settlement state machine; asset ownership, custody transfer and
//! royalty lookup live behind the [`traits::AssetRegistry`] collaborator
//! and fund movement behind [`traits::CurrencyLedger`].
//!
//! Every state-mutating operation follows the same discipline: acquire
//! the per-asset lock, validate preconditions, apply local effects, then
//! perform external interactions, rolling back the effects if an
//! interaction fails. Refunds owed to outbid or losing participants are
//! pull-based pending returns rather than synchronous pushes.

pub mod config;
pub mod error;
pub mod escrow;
pub mod events;
pub mod ids;
pub mod marketplace;
pub mod mocks;
pub mod royalty;
pub mod traits;

pub use config::MarketPolicy;
pub use error::{MarketError, MarketResult};
pub use escrow::{AssetLocks, PayoutEngine, PendingReturns};
pub use events::{EventLog, MarketEvent};
pub use ids::{AssetKey, CollectionId, ParticipantId};
pub use marketplace::{
    commitment_hash, random_secret, AuctionHouse, Commitment, EnglishAuction, Listing,
    ListingBook, Offer, SealedAuction, SealedAuctionHouse,
};
pub use traits::{
    AssetRegistry, CurrencyLedger, RoyaltySplit, SystemTimeProvider, TimeProvider,
};
