//! Commit-Reveal Auction Manager: two-phase sealed-bid auctions.
//!
//! Bidders first publish `H(amount_le || secret)` together with an escrow
//! ceiling, then disclose the amount and secret during the reveal window.
//! The leader is resolved reveal by reveal; settlement after `end_time`
//! reuses the same payout path as the English auction. Amounts owed back
//! (losing reveals, reveal surpluses, unrevealed escrow) accumulate as
//! pull-based pending returns.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{MarketError, MarketResult};
use crate::escrow::{PayoutEngine, PendingReturns};
use crate::events::MarketEvent;
use crate::ids::{AssetKey, ParticipantId};
use crate::traits::{AssetRegistry, CurrencyLedger, TimeProvider};

/// Compute the commitment hash for a sealed bid: SHA-256 over the bid
/// amount in little-endian bytes followed by the secret.
pub fn commitment_hash(amount: u64, secret: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(amount.to_le_bytes());
    hasher.update(secret);
    hasher.finalize().into()
}

/// Generate a random 32-byte reveal secret.
pub fn random_secret() -> [u8; 32] {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// One bidder's sealed commitment. `escrow` is the ceiling the eventual
/// reveal must stay within; `revealed` is monotone false-to-true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub hash: [u8; 32],
    pub escrow: u64,
    pub revealed: bool,
}

/// A sealed-bid auction.
///
/// Timeline: commits until `commit_phase_end`, reveals until
/// `reveal_phase_end`, settlement once `end_time` has passed. The leader
/// fields carry the best reveal so far; `ended` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedAuction {
    pub asset: AssetKey,
    pub seller: ParticipantId,
    pub starting_price: u64,
    pub commit_phase_end: u64,
    pub reveal_phase_end: u64,
    pub end_time: u64,
    pub current_bid: u64,
    pub current_bidder: Option<ParticipantId>,
    pub ended: bool,
    pub commitments: HashMap<ParticipantId, Commitment>,
}

impl SealedAuction {
    pub fn has_commitments(&self) -> bool {
        !self.commitments.is_empty()
    }
}

/// Sealed-bid auction house, keyed by asset like the English one.
#[derive(Clone)]
pub struct SealedAuctionHouse<R, L, C>
where
    R: AssetRegistry,
    L: CurrencyLedger,
    C: TimeProvider + Clone,
{
    engine: PayoutEngine<R, L>,
    time: C,
    auctions: Arc<Mutex<HashMap<AssetKey, SealedAuction>>>,
    pending: PendingReturns,
}

impl<R, L, C> SealedAuctionHouse<R, L, C>
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

    /// Open a sealed-bid auction. Phase boundaries come from the policy's
    /// commit and reveal windows; `duration` extends the settlement
    /// deadline past the reveal close.
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

        let now = self.time.now_unix();
        let commit_phase_end = now + self.engine.policy().commit_window;
        let reveal_phase_end = commit_phase_end + self.engine.policy().reveal_window;
        let end_time = reveal_phase_end + duration;

        self.engine.charge_fee(&caller, fee).await?;

        // effects
        let previous = auctions.insert(
            asset,
            SealedAuction {
                asset,
                seller: caller,
                starting_price,
                commit_phase_end,
                reveal_phase_end,
                end_time,
                current_bid: 0,
                current_bidder: None,
                ended: false,
                commitments: HashMap::new(),
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

        info!(%asset, seller = %caller, starting_price, commit_phase_end, reveal_phase_end, end_time,
              "sealed auction created");
        self.engine.events().record(MarketEvent::AuctionCreated {
            asset,
            seller: caller,
            starting_price,
            end_time,
        });
        Ok(())
    }

    /// Submit a commitment hash with an escrowed ceiling. One commitment
    /// per bidder; a second commit is rejected rather than overwritten, so
    /// escrow accounting stays unambiguous.
    pub async fn commit_bid(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        hash: [u8; 32],
        payment: u64,
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut auctions = self.auctions.lock().await;

        // checks
        let auction = auctions
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("auction {asset}")))?;
        if auction.ended {
            return Err(MarketError::AuctionEnded);
        }
        if self.time.now_unix() >= auction.commit_phase_end {
            return Err(MarketError::CommitClosed);
        }
        if auction.seller == caller {
            return Err(MarketError::SelfBid);
        }
        if payment == 0 {
            return Err(MarketError::InvalidAmount);
        }
        if auction.commitments.contains_key(&caller) {
            return Err(MarketError::AlreadyCommitted);
        }

        self.engine.collect(&caller, payment).await?;

        // effects
        auctions
            .get_mut(&asset)
            .expect("auction checked above")
            .commitments
            .insert(
                caller,
                Commitment {
                    hash,
                    escrow: payment,
                    revealed: false,
                },
            );

        info!(%asset, bidder = %caller, escrowed = payment, "bid committed");
        self.engine.events().record(MarketEvent::BidCommitted {
            asset,
            bidder: caller,
            escrowed: payment,
        });
        Ok(())
    }

    /// Disclose a committed bid during the reveal window.
    ///
    /// The amount and secret must hash to the stored commitment and the
    /// amount cannot exceed the escrowed ceiling. A winning reveal takes
    /// the lead and frees its surplus; a losing reveal frees the entire
    /// amount plus surplus. Every freed value lands in the bidder's
    /// pending return.
    pub async fn reveal_bid(
        &self,
        caller: ParticipantId,
        asset: AssetKey,
        amount: u64,
        secret: &[u8; 32],
    ) -> MarketResult<()> {
        let _guard = self.engine.lock_asset(&asset).await;
        let mut auctions = self.auctions.lock().await;

        // checks
        let auction = auctions
            .get(&asset)
            .ok_or_else(|| MarketError::NotFound(format!("auction {asset}")))?;
        if auction.ended {
            return Err(MarketError::AuctionEnded);
        }
        let now = self.time.now_unix();
        if now < auction.commit_phase_end || now >= auction.reveal_phase_end {
            return Err(MarketError::RevealClosed);
        }
        let commitment = auction
            .commitments
            .get(&caller)
            .ok_or(MarketError::NoCommitment)?;
        if commitment.revealed {
            return Err(MarketError::AlreadyRevealed);
        }
        if commitment_hash(amount, secret) != commitment.hash {
            return Err(MarketError::CommitmentMismatch);
        }
        if amount > commitment.escrow {
            return Err(MarketError::EscrowExceeded {
                amount,
                escrowed: commitment.escrow,
            });
        }
        let surplus = commitment.escrow - amount;
        let leading = amount >= auction.starting_price && amount > auction.current_bid;

        // effects
        let auction = auctions.get_mut(&asset).expect("auction checked above");
        auction
            .commitments
            .get_mut(&caller)
            .expect("commitment checked above")
            .revealed = true;
        self.pending.credit(&asset, &caller, surplus);
        if leading {
            if let Some(outbid) = auction.current_bidder {
                self.pending.credit(&asset, &outbid, auction.current_bid);
            }
            auction.current_bid = amount;
            auction.current_bidder = Some(caller);
        } else {
            self.pending.credit(&asset, &caller, amount);
        }

        info!(%asset, bidder = %caller, amount, leading, "bid revealed");
        self.engine.events().record(MarketEvent::BidRevealed {
            asset,
            bidder: caller,
            amount,
            leading,
        });
        Ok(())
    }

    /// Settle once `end_time` has passed. Unrevealed escrow is not
    /// forfeited: it moves to the committing bidder's pending return in
    /// the same operation. Settlement itself matches the English auction.
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
        let unrevealed: Vec<(ParticipantId, u64)> = auction
            .commitments
            .iter()
            .filter(|(_, c)| !c.revealed)
            .map(|(bidder, c)| (*bidder, c.escrow))
            .collect();
        if !unrevealed.is_empty() {
            warn!(%asset, count = unrevealed.len(), "unrevealed commitments released to pending returns");
        }

        // effects
        auctions.get_mut(&asset).expect("auction checked above").ended = true;
        for (bidder, escrow) in &unrevealed {
            self.pending.credit(&asset, bidder, *escrow);
        }

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
                info!(%asset, ?winner, amount, "sealed auction ended");
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
                for (bidder, escrow) in &unrevealed {
                    self.pending.debit(&asset, bidder, *escrow);
                }
                Err(err)
            }
        }
    }

    /// Pull any refundable balance: losing reveals, reveal surpluses,
    /// outbid amounts and unrevealed escrow. Zeroed before transfer.
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

    /// Cancel before the commit phase closes and before any commitment
    /// has been escrowed. Seller only.
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
        if self.time.now_unix() >= auction.commit_phase_end {
            return Err(MarketError::CommitClosed);
        }
        if auction.has_commitments() {
            return Err(MarketError::BidsPlaced);
        }

        // effects
        auctions.get_mut(&asset).expect("auction checked above").ended = true;

        // interactions
        if let Err(err) = self.engine.release_asset(&caller, &asset).await {
            auctions.get_mut(&asset).expect("auction checked above").ended = false;
            return Err(err);
        }

        info!(%asset, seller = %caller, "sealed auction cancelled");
        self.engine.events().record(MarketEvent::AuctionCancelled {
            asset,
            seller: caller,
        });
        Ok(())
    }

    /// Current auction record for an asset, if any.
    pub async fn auction(&self, asset: &AssetKey) -> Option<SealedAuction> {
        self.auctions.lock().await.get(asset).cloned()
    }

    /// A participant's refundable balance for one auction.
    pub fn pending_return(&self, asset: &AssetKey, participant: &ParticipantId) -> u64 {
        self.pending.balance(asset, participant)
    }
}
