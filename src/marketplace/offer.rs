//! Offer Book: escrow-backed offers on active listings.
//!
//! Offers live alongside the listing they target and are addressed by
//! their index in that listing's offer vector; indices are stable because
//! superseded offers are deactivated in place rather than removed.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MarketError, MarketResult};
use crate::events::MarketEvent;
use crate::ids::{AssetKey, ParticipantId};
use crate::marketplace::listing::ListingBook;
use crate::traits::{AssetRegistry, CurrencyLedger, TimeProvider};

/// An offer on a listed asset. `amount` is escrowed in the vault for as
/// long as the offer is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub buyer: ParticipantId,
    pub amount: u64,
    /// Unix timestamp after which the offer can no longer be accepted.
    pub expires_at: u64,
    pub active: bool,
}

impl Offer {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

impl<R, L, C> ListingBook<R, L, C>
where
    R: AssetRegistry,
    L: CurrencyLedger,
    C: TimeProvider + Clone,
{
    /// Place an offer on an active listing, escrowing the full amount.
    ///
    /// Returns the offer's index, which names it in `accept_offer` and
    /// `cancel_offer`.
    pub async fn make_offer(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        amount: u64,
        duration: u64,
        payment: u64,
    ) -> MarketResult<usize> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut state = self.state.lock().await;

        // checks
        let listing = state
            .listings
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("listing {asset}")))?;
        if listing.sold {
            return Err(MarketError::AlreadySold);
        }
        if listing.seller == caller {
            return Err(MarketError::SelfBid);
        }
        if amount == 0 {
            return Err(MarketError::InvalidAmount);
        }
        if payment != amount {
            return Err(MarketError::WrongAmount {
                required: amount,
                paid: payment,
            });
        }
        self.engine.policy().check_offer_duration(duration)?;
        let expires_at = self.time.now_unix() + duration;

        self.engine.collect(&caller, amount).await?;

        // effects
        let offers = state.offers.entry(asset).or_default();
        let index = offers.len();
        offers.push(Offer {
            buyer: caller,
            amount,
            expires_at,
            active: true,
        });

        info!(%asset, buyer = %caller, amount, expires_at, index, "offer placed");
        self.engine.events().record(MarketEvent::OfferCreated {
            asset,
            buyer: caller,
            amount,
            expires_at,
        });
        Ok(index)
    }

    /// Accept an offer by index. Seller only; the offer must still be
    /// active and unexpired. The escrowed amount settles exactly like a
    /// purchase at that price, and every other still-active offer is
    /// refunded in the same settlement.
    pub async fn accept_offer(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        index: usize,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut state = self.state.lock().await;

        // checks
        let listing = state
            .listings
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("listing {asset}")))?;
        if listing.sold {
            return Err(MarketError::AlreadySold);
        }
        if listing.seller != caller {
            return Err(MarketError::NotSeller);
        }
        let seller = listing.seller;
        let offers = state.offers.get(&asset).map_or(&[][..], Vec::as_slice);
        let offer = offers.get(index).ok_or(MarketError::InvalidIndex(index))?;
        if !offer.active {
            return Err(MarketError::OfferInactive);
        }
        if offer.is_expired(self.time.now_unix()) {
            return Err(MarketError::OfferExpired);
        }
        let buyer = offer.buyer;
        let amount = offer.amount;

        // effects
        let listing_snapshot = listing.clone();
        let offers_snapshot = offers.to_vec();
        {
            let listing = state.listings.get_mut(&asset).expect("listing checked above");
            listing.sold = true;
            listing.custodian = buyer;
        }
        state.unsold.remove(&asset);
        let mut refunds = Vec::new();
        if let Some(offers) = state.offers.get_mut(&asset) {
            for (i, offer) in offers.iter_mut().enumerate() {
                if !offer.active {
                    continue;
                }
                offer.active = false;
                if i != index {
                    refunds.push((offer.buyer, offer.amount));
                }
            }
        }

        // interactions
        match self
            .engine
            .settle_sale(&asset, &seller, &buyer, amount, &refunds)
            .await
        {
            Ok(royalty) => {
                info!(%asset, %buyer, amount, index, "offer accepted");
                self.engine.events().record(MarketEvent::OfferAccepted {
                    asset,
                    index,
                    buyer,
                    amount,
                    royalty,
                });
                Ok(())
            }
            Err(err) => {
                state.listings.insert(asset, listing_snapshot);
                state.offers.insert(asset, offers_snapshot);
                state.unsold.insert(asset);
                Err(err)
            }
        }
    }

    /// Cancel an offer and reclaim its escrow. Buyer only; works whether
    /// or not the offer has expired.
    pub async fn cancel_offer(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        index: usize,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut state = self.state.lock().await;

        // checks
        let offers = state
            .offers
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("offers for {asset}")))?;
        let offer = offers.get(index).ok_or(MarketError::InvalidIndex(index))?;
        if offer.buyer != caller {
            return Err(MarketError::NotBuyer);
        }
        if !offer.active {
            return Err(MarketError::OfferInactive);
        }
        let amount = offer.amount;

        // effects
        state.offers.get_mut(&asset).expect("offers checked above")[index].active = false;

        // interactions
        if let Err(err) = self.engine.disburse(&caller, amount).await {
            state.offers.get_mut(&asset).expect("offers checked above")[index].active = true;
            return Err(err);
        }

        info!(%asset, buyer = %caller, index, "offer cancelled");
        self.engine.events().record(MarketEvent::OfferCancelled {
            asset,
            index,
            buyer: caller,
        });
        Ok(())
    }

    /// All offers recorded against an asset, active or not, in placement
    /// order.
    pub async fn offers(&self, asset: &AssetKey) -> Vec<Offer> {
        self.state
            .lock()
            .await
            .offers
            .get(asset)
            .cloned()
            .unwrap_or_default()
    }
}
