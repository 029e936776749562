//! Identity newtypes shared across the marketplace crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a participant (seller, buyer, bidder, royalty receiver or
/// the engine's own escrow vault), as supplied by the execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 32]);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..6]))
    }
}

/// Identity of an asset collection in the external Asset Registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub [u8; 32]);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..6]))
    }
}

/// Key of a unique asset: a collection plus a token number within it.
///
/// Listings, offers and auctions are all keyed by this pair; at most one
/// active listing or auction may exist per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey {
    pub collection: CollectionId,
    pub token: u64,
}

impl AssetKey {
    pub const fn new(collection: CollectionId, token: u64) -> Self {
        Self { collection, token }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.token)
    }
}
