//! Injected interaction failures must leave all authoritative state
//! unchanged, and a corrected retry must then succeed.

use bazaar::{commitment_hash, MarketError};

use crate::common::MarketHarness;

const DAY: u64 = 86_400;
const HOUR: u64 = 3_600;

/// A purchase whose custody transfer is rejected rolls back completely:
/// listing open, buyer repaid, escrow intact; a retry settles normally.
#[tokio::test]
async fn test_purchase_rollback_then_retry() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let buyer = h.participant(2, 100);
    let asset = h.mint(seller, 1);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.registry.set_fail_transfers(true);

    let err = h.book.purchase(buyer, asset, 100).await.unwrap_err();
    assert!(matches!(err, MarketError::Custody(_)));
    assert!(!h.book.listing(&asset).await.unwrap().sold);
    assert_eq!(h.balance(&buyer), 100);
    assert_eq!(h.owner(&asset), Some(h.vault));

    h.registry.set_fail_transfers(false);
    h.book.purchase(buyer, asset, 100).await.unwrap();
    assert_eq!(h.owner(&asset), Some(buyer));
    assert_eq!(h.balance(&seller), 100);
}

/// A settlement that fails midway, after custody and the royalty payout
/// have gone through, is unwound in full.
#[tokio::test]
async fn test_purchase_unwinds_partial_settlement() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let buyer = h.participant(2, 100);
    let creator = h.participant(9, 0);
    let asset = h.mint(seller, 1);
    h.set_royalty(creator, 500);

    h.book.list(seller, asset, 100, 0).await.unwrap();

    // Buyer escrow and custody release succeed, the royalty payout fails.
    h.ledger.fail_after(1);

    let err = h.book.purchase(buyer, asset, 100).await.unwrap_err();
    assert!(matches!(err, MarketError::Transfer(_)));

    assert!(!h.book.listing(&asset).await.unwrap().sold);
    assert_eq!(h.owner(&asset), Some(h.vault));
    assert_eq!(h.balance(&buyer), 100);
    assert_eq!(h.balance(&creator), 0);
    assert_eq!(h.balance(&seller), 0);
    assert_eq!(h.balance(&h.vault), 0);
}

/// Accepting an offer that fails to settle leaves every offer active and
/// escrowed exactly as before.
#[tokio::test]
async fn test_accept_offer_rollback_keeps_offer_book() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let alice = h.participant(2, 60);
    let bob = h.participant(3, 70);
    let asset = h.mint(seller, 1);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.book.make_offer(alice, asset, 60, HOUR, 60).await.unwrap();
    h.book.make_offer(bob, asset, 70, HOUR, 70).await.unwrap();

    h.registry.set_fail_transfers(true);
    let err = h.book.accept_offer(seller, asset, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::Custody(_)));

    let offers = h.book.offers(&asset).await;
    assert!(offers.iter().all(|o| o.active));
    assert_eq!(h.balance(&alice), 0);
    assert_eq!(h.balance(&bob), 0);

    h.registry.set_fail_transfers(false);
    h.book.accept_offer(seller, asset, 1).await.unwrap();
    assert_eq!(h.owner(&asset), Some(bob));
    assert_eq!(h.balance(&alice), 60);
}

/// An auction settlement failure leaves the auction endable again, with
/// no funds moved in between.
#[tokio::test]
async fn test_end_auction_rollback_allows_retry() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let bidder = h.participant(2, 20);
    let asset = h.mint(seller, 1);

    h.auctions
        .create_auction(seller, asset, 10, DAY, 0)
        .await
        .unwrap();
    h.auctions.place_bid(bidder, asset, 15, 15).await.unwrap();
    h.advance_time(DAY);

    h.ledger.set_fail_transfers(true);
    let err = h.auctions.end_auction(asset).await.unwrap_err();
    assert!(matches!(err, MarketError::Custody(_) | MarketError::Transfer(_)));
    assert!(!h.auctions.auction(&asset).await.unwrap().ended);
    assert_eq!(h.balance(&seller), 0);

    h.ledger.set_fail_transfers(false);
    h.auctions.end_auction(asset).await.unwrap();
    assert_eq!(h.owner(&asset), Some(bidder));
    assert_eq!(h.balance(&seller), 15);
}

/// Failed listing creation refunds the listing fee and records nothing.
#[tokio::test]
async fn test_list_rollback_refunds_fee() {
    let policy = bazaar::MarketPolicy {
        listing_fee: 5,
        ..bazaar::MarketPolicy::default()
    };
    let h = MarketHarness::with_policy(policy);
    let seller = h.participant(1, 5);
    let asset = h.mint(seller, 1);

    h.registry.set_fail_transfers(true);
    let err = h.book.list(seller, asset, 100, 5).await.unwrap_err();
    assert!(matches!(err, MarketError::Custody(_)));

    assert!(h.book.listing(&asset).await.is_none());
    assert_eq!(h.balance(&seller), 5);
    assert_eq!(h.balance(&h.fee_account), 0);
    assert!(h.events.is_empty());
}

/// A failed sealed-auction settlement rolls back the unrevealed-escrow
/// pending-return credits along with the ended flag.
#[tokio::test]
async fn test_sealed_end_rollback_reverts_pending_credits() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let bidder = h.participant(2, 40);
    let silent = h.participant(3, 25);
    let asset = h.mint(seller, 1);
    let secret = [5u8; 32];

    h.sealed
        .create_auction(seller, asset, 10, DAY, 0)
        .await
        .unwrap();
    h.sealed
        .commit_bid(bidder, asset, commitment_hash(40, &secret), 40)
        .await
        .unwrap();
    h.sealed
        .commit_bid(silent, asset, commitment_hash(25, &[6u8; 32]), 25)
        .await
        .unwrap();
    h.advance_time(HOUR);
    h.sealed.reveal_bid(bidder, asset, 40, &secret).await.unwrap();
    h.advance_time(HOUR + DAY);

    h.registry.set_fail_transfers(true);
    assert!(h.sealed.end_auction(asset).await.is_err());
    assert_eq!(h.sealed.pending_return(&asset, &silent), 0);
    assert!(!h.sealed.auction(&asset).await.unwrap().ended);

    h.registry.set_fail_transfers(false);
    h.sealed.end_auction(asset).await.unwrap();
    assert_eq!(h.sealed.pending_return(&asset, &silent), 25);
    assert_eq!(h.balance(&seller), 40);
}
