//! Fixed-price Listing Registry and the purchase path.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{MarketError, MarketResult};
use crate::escrow::PayoutEngine;
use crate::events::MarketEvent;
use crate::ids::{AssetKey, ParticipantId};
use crate::marketplace::offer::Offer;
use crate::traits::{AssetRegistry, CurrencyLedger, TimeProvider};

/// A fixed-price listing.
///
/// While unsold, the engine's vault holds custody of the asset. `sold`
/// is monotone false-to-true for one sale cycle; `relist` starts a new
/// cycle for the new owner of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub asset: AssetKey,
    pub seller: ParticipantId,
    pub price: u64,
    pub sold: bool,
    /// Owner of record after settlement; the vault while active.
    pub custodian: ParticipantId,
}

#[derive(Debug, Default)]
pub(crate) struct BookState {
    pub(crate) listings: HashMap<AssetKey, Listing>,
    pub(crate) offers: HashMap<AssetKey, Vec<Offer>>,
    /// Secondary index of currently unsold listings, maintained
    /// incrementally so enumeration is O(active), never a full scan.
    pub(crate) unsold: BTreeSet<AssetKey>,
}

/// Listing Registry: fixed-price listings keyed by asset, plus the offer
/// book that rides on them (see `offer.rs`).
#[derive(Clone)]
pub struct ListingBook<R, L, C>
where
    R: AssetRegistry,
    L: CurrencyLedger,
    C: TimeProvider + Clone,
{
    pub(crate) engine: PayoutEngine<R, L>,
    pub(crate) time: C,
    pub(crate) state: Arc<Mutex<BookState>>,
}

impl<R, L, C> ListingBook<R, L, C>
where
    R: AssetRegistry,
    L: CurrencyLedger,
    C: TimeProvider + Clone,
{
    pub fn new(engine: PayoutEngine<R, L>, time: C) -> Self {
        Self {
            engine,
            time,
            state: Arc::new(Mutex::new(BookState::default())),
        }
    }

    /// List an asset at a fixed price.
    ///
    /// The caller must own the asset and have pre-authorized the vault to
    /// take custody; the attached payment must equal the policy's listing
    /// fee. Custody moves to the vault on success.
    pub async fn list(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        price: u64,
        payment: u64,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut state = self.state.lock().await;

        // checks
        if price == 0 {
            return Err(MarketError::InvalidPrice);
        }
        let fee = self.engine.policy().listing_fee;
        if payment != fee {
            return Err(MarketError::WrongAmount {
                required: fee,
                paid: payment,
            });
        }
        if state.listings.get(&asset).is_some_and(|l| !l.sold) {
            return Err(MarketError::AlreadyListed);
        }
        self.engine.expect_owner_and_authorized(&caller, &asset).await?;

        self.engine.charge_fee(&caller, fee).await?;

        // effects
        let previous_listing = state.listings.insert(
            asset,
            Listing {
                asset,
                seller: caller,
                price,
                sold: false,
                custodian: self.engine.vault(),
            },
        );
        let previous_offers = state.offers.insert(asset, Vec::new());
        state.unsold.insert(asset);

        // interactions
        if let Err(err) = self.engine.pull_asset(&caller, &asset).await {
            // A sold record from an earlier cycle may have been displaced;
            // put it back rather than leaving a hole.
            match previous_listing {
                Some(old) => state.listings.insert(asset, old),
                None => state.listings.remove(&asset),
            };
            match previous_offers {
                Some(old) => state.offers.insert(asset, old),
                None => state.offers.remove(&asset),
            };
            state.unsold.remove(&asset);
            self.engine.refund_fee(&caller, fee).await;
            return Err(err);
        }

        info!(%asset, seller = %caller, price, "asset listed");
        self.engine.events().record(MarketEvent::ListingCreated {
            asset,
            seller: caller,
            price,
        });
        Ok(())
    }

    /// Buy a listed asset at exactly its asking price.
    ///
    /// Settlement order: mark sold, then royalty computation, custody to
    /// the buyer, royalty payout, seller payout, and refunds for every
    /// offer whose escrow was still held. Any interaction failure rolls
    /// the whole operation back.
    pub async fn purchase(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        payment: u64,
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
        if payment != listing.price {
            return Err(MarketError::WrongAmount {
                required: listing.price,
                paid: payment,
            });
        }
        let seller = listing.seller;
        let price = listing.price;

        self.engine.collect(&caller, payment).await?;

        // effects
        let listing_snapshot = listing.clone();
        let offers_snapshot = state.offers.get(&asset).cloned().unwrap_or_default();
        {
            let listing = state.listings.get_mut(&asset).expect("listing checked above");
            listing.sold = true;
            listing.custodian = caller;
        }
        state.unsold.remove(&asset);
        let mut refunds = Vec::new();
        if let Some(offers) = state.offers.get_mut(&asset) {
            for offer in offers.iter_mut().filter(|o| o.active) {
                offer.active = false;
                refunds.push((offer.buyer, offer.amount));
            }
        }

        // interactions
        match self
            .engine
            .settle_sale(&asset, &seller, &caller, price, &refunds)
            .await
        {
            Ok(royalty) => {
                info!(%asset, buyer = %caller, price, "purchase settled");
                self.engine.events().record(MarketEvent::PurchaseSettled {
                    asset,
                    seller,
                    buyer: caller,
                    price,
                    royalty,
                });
                Ok(())
            }
            Err(err) => {
                state.listings.insert(asset, listing_snapshot);
                state.offers.insert(asset, offers_snapshot);
                state.unsold.insert(asset);
                self.engine.refund_collected(&caller, payment).await;
                Err(err)
            }
        }
    }

    /// Put a previously sold asset back on the market at a new price.
    ///
    /// Only the current owner of record may relist; a fresh listing fee
    /// is due if the policy charges one.
    pub async fn relist(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        price: u64,
        payment: u64,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut state = self.state.lock().await;

        // checks
        let listing = state
            .listings
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("listing {asset}")))?;
        if !listing.sold {
            return Err(MarketError::AlreadyListed);
        }
        if price == 0 {
            return Err(MarketError::InvalidPrice);
        }
        let fee = self.engine.policy().listing_fee;
        if payment != fee {
            return Err(MarketError::WrongAmount {
                required: fee,
                paid: payment,
            });
        }
        self.engine.expect_owner_and_authorized(&caller, &asset).await?;

        self.engine.charge_fee(&caller, fee).await?;

        // effects
        let listing_snapshot = listing.clone();
        {
            let listing = state.listings.get_mut(&asset).expect("listing checked above");
            listing.seller = caller;
            listing.price = price;
            listing.sold = false;
            listing.custodian = self.engine.vault();
        }
        state.offers.insert(asset, Vec::new());
        state.unsold.insert(asset);

        // interactions
        if let Err(err) = self.engine.pull_asset(&caller, &asset).await {
            state.listings.insert(asset, listing_snapshot);
            state.offers.insert(asset, Vec::new());
            state.unsold.remove(&asset);
            self.engine.refund_fee(&caller, fee).await;
            return Err(err);
        }

        info!(%asset, seller = %caller, price, "asset relisted");
        self.engine.events().record(MarketEvent::Relisted {
            asset,
            seller: caller,
            price,
        });
        Ok(())
    }

    /// Withdraw an unsold listing. Returns custody to the seller and
    /// refunds the escrow of every offer still active.
    pub async fn delist(&self, caller: ParticipantId, asset: AssetKey) -> MarketResult<()> {
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

        // effects
        let listing_snapshot = listing.clone();
        let offers_snapshot = state.offers.get(&asset).cloned().unwrap_or_default();
        state.listings.remove(&asset);
        state.unsold.remove(&asset);
        let refunds: Vec<(ParticipantId, u64)> = offers_snapshot
            .iter()
            .filter(|o| o.active)
            .map(|o| (o.buyer, o.amount))
            .collect();
        state.offers.remove(&asset);

        // interactions
        match self.run_delist(&caller, &asset, &refunds).await {
            Ok(()) => {
                info!(%asset, seller = %caller, "listing removed");
                self.engine.events().record(MarketEvent::ListingRemoved {
                    asset,
                    seller: caller,
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

    async fn run_delist(
        &self,
        seller: &ParticipantId,
        asset: &AssetKey,
        refunds: &[(ParticipantId, u64)],
    ) -> MarketResult<()> {
        self.engine.release_asset(seller, asset).await?;
        let mut delivered: Vec<(ParticipantId, u64)> = Vec::new();
        for (buyer, amount) in refunds {
            if let Err(err) = self.engine.disburse(buyer, *amount).await {
                for (b, a) in delivered.iter().rev() {
                    if let Err(e) = self.engine.collect(b, *a).await {
                        warn!(buyer = %b, amount = a, error = %e,
                              "delist unwind: refund could not be reclaimed");
                    }
                }
                if let Err(e) = self.engine.pull_asset(seller, asset).await {
                    warn!(%asset, error = %e, "delist unwind: custody could not be reclaimed");
                }
                return Err(err);
            }
            delivered.push((*buyer, *amount));
        }
        Ok(())
    }

    /// Current listing record for an asset, if any.
    pub async fn listing(&self, asset: &AssetKey) -> Option<Listing> {
        self.state.lock().await.listings.get(asset).cloned()
    }

    /// Keys of all currently unsold listings, in key order.
    pub async fn active_listings(&self) -> Vec<AssetKey> {
        self.state.lock().await.unsold.iter().copied().collect()
    }
}
