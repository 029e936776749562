//! English Auction Manager: ascending-bid, time-boxed auctions with
//! refund-on-outbid through pull-based pending returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{MarketError, MarketResult};
use crate::escrow::{PayoutEngine, PendingReturns};
use crate::events::MarketEvent;
use crate::ids::{AssetKey, ParticipantId};
use crate::traits::{AssetRegistry, CurrencyLedger, TimeProvider};

/// An ascending-bid auction.
///
/// `current_bid` is zero exactly while no bid has been placed, and is
/// otherwise at least `starting_price`. `ended` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnglishAuction {
    pub asset: AssetKey,
    pub seller: ParticipantId,
    pub starting_price: u64,
    pub current_bid: u64,
    pub current_bidder: Option<ParticipantId>,
    pub end_time: u64,
    pub ended: bool,
}

impl EnglishAuction {
    pub fn has_bids(&self) -> bool {
        self.current_bidder.is_some()
    }
}

/// English auction house. Auctions are keyed by asset; a finished auction's
/// record stays behind (with `ended` set) until a new one replaces it.
#[derive(Clone)]
pub struct AuctionHouse<R, L, C>
where
    R: AssetRegistry,
    L: CurrencyLedger,
    C: TimeProvider + Clone,
{
    engine: PayoutEngine<R, L>,
    time: C,
    auctions: Arc<Mutex<HashMap<AssetKey, EnglishAuction>>>,
    pending: PendingReturns,
}

impl<R, L, C> AuctionHouse<R, L, C>
where
    R: AssetRegistry,
    L: CurrencyLedger,
    C: TimeProvider + Clone,
{
    pub fn new(engine: PayoutEngine<R, L>, time: C) -> Self {
        Self {
            engine,
            time,
            auctions: Arc::new(Mutex::new(HashMap::new())),
            pending: PendingReturns::new(),
        }
    }

    /// Open an auction. The caller must own the asset and have authorized
    /// the vault; custody moves to the vault for the auction's lifetime.
    pub async fn create_auction(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        starting_price: u64,
        duration: u64,
        payment: u64,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut auctions = self.auctions.lock().await;

        // checks
        if starting_price == 0 {
            return Err(MarketError::InvalidPrice);
        }
        self.engine.policy().check_auction_duration(duration)?;
        let fee = self.engine.policy().auction_fee;
        if payment != fee {
            return Err(MarketError::WrongAmount {
                required: fee,
                paid: payment,
            });
        }
        if auctions.get(&asset).is_some_and(|a| !a.ended) {
            return Err(MarketError::AuctionActive);
        }
        self.engine.expect_owner_and_authorized(&caller, &asset).await?;
        let end_time = self.time.now_unix() + duration;

        self.engine.charge_fee(&caller, fee).await?;

        // effects
        let previous = auctions.insert(
            asset,
            EnglishAuction {
                asset,
                seller: caller,
                starting_price,
                current_bid: 0,
                current_bidder: None,
                end_time,
                ended: false,
            },
        );

        // interactions
        if let Err(err) = self.engine.pull_asset(&caller, &asset).await {
            match previous {
                Some(old) => auctions.insert(asset, old),
                None => auctions.remove(&asset),
            };
            self.engine.refund_fee(&caller, fee).await;
            return Err(err);
        }

        info!(%asset, seller = %caller, starting_price, end_time, "auction created");
        self.engine.events().record(MarketEvent::AuctionCreated {
            asset,
            seller: caller,
            starting_price,
            end_time,
        });
        Ok(())
    }

    /// Place a bid, escrowing the full amount. A superseded leader's bid
    /// moves to their pending return in the same operation.
    pub async fn place_bid(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        amount: u64,
        payment: u64,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut auctions = self.auctions.lock().await;

        // checks
        let auction = auctions
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("auction {asset}")))?;
        if auction.ended || self.time.now_unix() >= auction.end_time {
            return Err(MarketError::AuctionEnded);
        }
        if auction.seller == caller {
            return Err(MarketError::SelfBid);
        }
        let floor = auction.current_bid.max(auction.starting_price);
        if amount < auction.starting_price || amount <= auction.current_bid {
            return Err(MarketError::BidTooLow { bid: amount, floor });
        }
        if payment != amount {
            return Err(MarketError::WrongAmount {
                required: amount,
                paid: payment,
            });
        }

        self.engine.collect(&caller, amount).await?;

        // effects
        let auction = auctions.get_mut(&asset).expect("auction checked above");
        if let Some(outbid) = auction.current_bidder {
            self.pending.credit(&asset, &outbid, auction.current_bid);
        }
        auction.current_bid = amount;
        auction.current_bidder = Some(caller);

        info!(%asset, bidder = %caller, amount, "bid placed");
        self.engine.events().record(MarketEvent::BidPlaced {
            asset,
            bidder: caller,
            amount,
        });
        Ok(())
    }

    /// Settle an auction once its end time has passed. Callable by anyone,
    /// exactly once. With a winner, the asset goes to them and the seller
    /// receives the winning bid minus royalty; without bids the asset
    /// returns to the seller.
    pub async fn end_auction(&self, asset: AssetKey) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut auctions = self.auctions.lock().await;

        // checks
        let auction = auctions
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("auction {asset}")))?;
        if auction.ended {
            return Err(MarketError::AuctionEnded);
        }
        if self.time.now_unix() < auction.end_time {
            return Err(MarketError::AuctionActive);
        }
        let seller = auction.seller;
        let winner = auction.current_bidder;
        let amount = auction.current_bid;

        // effects
        auctions.get_mut(&asset).expect("auction checked above").ended = true;

        // interactions
        let outcome = match winner {
            Some(winner) => self
                .engine
                .settle_sale(&asset, &seller, &winner, amount, &[])
                .await,
            None => self.engine.release_asset(&seller, &asset).await.map(|()| None),
        };
        match outcome {
            Ok(royalty) => {
                info!(%asset, ?winner, amount, "auction ended");
                self.engine.events().record(MarketEvent::AuctionEnded {
                    asset,
                    winner,
                    amount,
                    royalty,
                });
                Ok(())
            }
            Err(err) => {
                auctions.get_mut(&asset).expect("auction checked above").ended = false;
                Err(err)
            }
        }
    }

    /// Pull any refundable balance accumulated by being outbid. The
    /// balance is zeroed before the transfer is attempted.
    pub async fn withdraw_pending_return(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
    ) -> MarketResult<u64> {
        let _guard = self.engine.lock_asset(&asset).await;

        let amount = self.pending.take(&asset, &caller);
        if amount == 0 {
            return Err(MarketError::NothingToWithdraw);
        }
        if let Err(err) = self.engine.disburse(&caller, amount).await {
            self.pending.credit(&asset, &caller, amount);
            return Err(err);
        }

        info!(%asset, participant = %caller, amount, "pending return withdrawn");
        self.engine
            .events()
            .record(MarketEvent::PendingReturnWithdrawn {
                asset,
                participant: caller,
                amount,
            });
        Ok(amount)
    }

    /// Cancel an auction before any bid has been placed. Seller only.
    pub async fn cancel_auction(&self, caller: ParticipantId, asset: AssetKey) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut auctions = self.auctions.lock().await;

        // checks
        let auction = auctions
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("auction {asset}")))?;
        if auction.ended {
            return Err(MarketError::AuctionEnded);
        }
        if auction.seller != caller {
            return Err(MarketError::NotSeller);
        }
        if auction.has_bids() {
            return Err(MarketError::BidsPlaced);
        }

        // effects
        auctions.get_mut(&asset).expect("auction checked above").ended = true;

        // interactions
        if let Err(err) = self.engine.release_asset(&caller, &asset).await {
            auctions.get_mut(&asset).expect("auction checked above").ended = false;
            return Err(err);
        }

        info!(%asset, seller = %caller, "auction cancelled");
        self.engine.events().record(MarketEvent::AuctionCancelled {
            asset,
            seller: caller,
        });
        Ok(())
    }

    /// Current auction record for an asset, if any.
    pub async fn auction(&self, asset: &AssetKey) -> Option<EnglishAuction> {
        self.auctions.lock().await.get(asset).cloned()
    }

    /// A participant's refundable balance for one auction.
    pub fn pending_return(&self, asset: &AssetKey, participant: &ParticipantId) -> u64 {
        self.pending.balance(asset, participant)
    }
}
