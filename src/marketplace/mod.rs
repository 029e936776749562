//! The four caller-facing components: fixed-price listings with purchase,
//! the negotiated offer book, the English auction house and the
//! commit-reveal sealed-bid auction house.

pub mod auction;
pub mod listing;
pub mod offer;
pub mod sealed;

pub use auction::{AuctionHouse, EnglishAuction};
pub use listing::{Listing, ListingBook};
pub use offer::Offer;
pub use sealed::{commitment_hash, random_secret, Commitment, SealedAuction, SealedAuctionHouse};
