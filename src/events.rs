//! Append-only log of marketplace state transitions.
//!
//! One record per externally observable transition. The log is the
//! non-authoritative read side: projections (search, indexing) consume it;
//! the engines never read their own state back out of it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::ids::{AssetKey, CollectionId, ParticipantId};
use crate::traits::RoyaltySplit;

/// A single marketplace state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketEvent {
    ListingCreated {
        asset: AssetKey,
        seller: ParticipantId,
        price: u64,
    },
    ListingRemoved {
        asset: AssetKey,
        seller: ParticipantId,
    },
    Relisted {
        asset: AssetKey,
        seller: ParticipantId,
        price: u64,
    },
    PurchaseSettled {
        asset: AssetKey,
        seller: ParticipantId,
        buyer: ParticipantId,
        price: u64,
        royalty: Option<RoyaltySplit>,
    },
    OfferCreated {
        asset: AssetKey,
        buyer: ParticipantId,
        amount: u64,
        expires_at: u64,
    },
    OfferAccepted {
        asset: AssetKey,
        index: usize,
        buyer: ParticipantId,
        amount: u64,
        royalty: Option<RoyaltySplit>,
    },
    OfferCancelled {
        asset: AssetKey,
        index: usize,
        buyer: ParticipantId,
    },
    AuctionCreated {
        asset: AssetKey,
        seller: ParticipantId,
        starting_price: u64,
        end_time: u64,
    },
    BidPlaced {
        asset: AssetKey,
        bidder: ParticipantId,
        amount: u64,
    },
    BidCommitted {
        asset: AssetKey,
        bidder: ParticipantId,
        escrowed: u64,
    },
    BidRevealed {
        asset: AssetKey,
        bidder: ParticipantId,
        amount: u64,
        leading: bool,
    },
    AuctionEnded {
        asset: AssetKey,
        winner: Option<ParticipantId>,
        amount: u64,
        royalty: Option<RoyaltySplit>,
    },
    AuctionCancelled {
        asset: AssetKey,
        seller: ParticipantId,
    },
    PendingReturnWithdrawn {
        asset: AssetKey,
        participant: ParticipantId,
        amount: u64,
    },
    RoyaltySet {
        collection: CollectionId,
        receiver: ParticipantId,
        bps: u64,
    },
}

/// Shared append-only event log.
///
/// Clones share the same underlying buffer, so one log can be handed to
/// every engine (and to the registry collaborator for `RoyaltySet`) and
/// projections see a single ordered stream.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<RwLock<Vec<MarketEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: MarketEvent) {
        info!(event = ?event, "market event");
        self.inner.write().push(event);
    }

    /// Snapshot of all events recorded so far, in order.
    pub fn snapshot(&self) -> Vec<MarketEvent> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Serialize the full log to CBOR for read-side projections.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let mut buffer = Vec::new();
        ciborium::into_writer(&*self.inner.read(), &mut buffer)?;
        Ok(buffer)
    }

    /// Deserialize a log snapshot from CBOR bytes.
    pub fn from_cbor(data: &[u8]) -> Result<Vec<MarketEvent>, ciborium::de::Error<std::io::Error>> {
        ciborium::from_reader(data)
    }
}
