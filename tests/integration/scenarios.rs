//! End-to-end scenarios covering each selling path.

use bazaar::{commitment_hash, MarketEvent, MarketPolicy};

use crate::common::MarketHarness;

const DAY: u64 = 86_400;

/// List at 100 with a 5% royalty; the buyer pays exactly 100, the creator
/// receives 5, the seller 95, and the buyer owns the asset.
#[tokio::test]
async fn test_fixed_price_sale_with_royalty() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let buyer = h.participant(2, 100);
    let creator = h.participant(9, 0);
    let asset = h.mint(seller, 1);
    h.set_royalty(creator, 500);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.book.purchase(buyer, asset, 100).await.unwrap();

    assert_eq!(h.owner(&asset), Some(buyer));
    assert_eq!(h.balance(&creator), 5);
    assert_eq!(h.balance(&seller), 95);
    assert_eq!(h.balance(&buyer), 0);
    assert_eq!(h.balance(&h.vault), 0);

    let settled = h.events_where(|e| matches!(e, MarketEvent::PurchaseSettled { .. }));
    assert_eq!(settled.len(), 1);
}

/// Same sale with listing fees switched on: the fee account collects the
/// fee and the seller's proceeds are unaffected by it (the fee was paid
/// at listing time).
#[tokio::test]
async fn test_fixed_price_sale_with_listing_fee() {
    let policy = MarketPolicy {
        listing_fee: 3,
        ..MarketPolicy::default()
    };
    let h = MarketHarness::with_policy(policy);
    let seller = h.participant(1, 3);
    let buyer = h.participant(2, 100);
    let asset = h.mint(seller, 1);

    h.book.list(seller, asset, 100, 3).await.unwrap();
    h.book.purchase(buyer, asset, 100).await.unwrap();

    assert_eq!(h.balance(&h.fee_account), 3);
    assert_eq!(h.balance(&seller), 100);
}

/// English auction on asset #2, starting price 10: bids of 12 then 15;
/// the first bidder's pending return becomes 12; after the end time the
/// winner owns the asset and the seller is paid 15 minus royalty.
#[tokio::test]
async fn test_english_auction_end_to_end() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let buyer1 = h.participant(2, 12);
    let buyer2 = h.participant(3, 15);
    let creator = h.participant(9, 0);
    let asset = h.mint(seller, 2);
    h.set_royalty(creator, 1_000);

    h.auctions
        .create_auction(seller, asset, 10, DAY, 0)
        .await
        .unwrap();
    h.auctions.place_bid(buyer1, asset, 12, 12).await.unwrap();
    h.auctions.place_bid(buyer2, asset, 15, 15).await.unwrap();

    assert_eq!(h.auctions.pending_return(&asset, &buyer1), 12);

    h.advance_time(DAY);
    h.auctions.end_auction(asset).await.unwrap();

    assert_eq!(h.owner(&asset), Some(buyer2));
    assert_eq!(h.balance(&creator), 1);
    assert_eq!(h.balance(&seller), 14);

    h.auctions
        .withdraw_pending_return(buyer1, asset)
        .await
        .unwrap();
    assert_eq!(h.balance(&buyer1), 12);
    assert_eq!(h.balance(&h.vault), 0);
}

/// Commit-reveal auction: escrows of 50 and 30, reveals of 40 and 30.
/// The first bidder leads with 40 and gets the surplus of 10 back; the
/// losing bidder's 30 is fully refundable.
#[tokio::test]
async fn test_sealed_auction_end_to_end() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let bidder1 = h.participant(2, 50);
    let bidder2 = h.participant(3, 30);
    let asset = h.mint(seller, 3);

    let secret1 = [7u8; 32];
    let secret2 = [9u8; 32];

    h.sealed
        .create_auction(seller, asset, 10, DAY, 0)
        .await
        .unwrap();
    h.sealed
        .commit_bid(bidder1, asset, commitment_hash(40, &secret1), 50)
        .await
        .unwrap();
    h.sealed
        .commit_bid(bidder2, asset, commitment_hash(30, &secret2), 30)
        .await
        .unwrap();

    // Into the reveal window.
    h.advance_time(3_600);
    h.sealed.reveal_bid(bidder1, asset, 40, &secret1).await.unwrap();
    h.sealed.reveal_bid(bidder2, asset, 30, &secret2).await.unwrap();

    assert_eq!(h.sealed.pending_return(&asset, &bidder1), 10);
    assert_eq!(h.sealed.pending_return(&asset, &bidder2), 30);

    // Past reveal close plus the auction duration.
    h.advance_time(3_600 + DAY);
    h.sealed.end_auction(asset).await.unwrap();

    assert_eq!(h.owner(&asset), Some(bidder1));
    assert_eq!(h.balance(&seller), 40);

    h.sealed.withdraw_pending_return(bidder1, asset).await.unwrap();
    h.sealed.withdraw_pending_return(bidder2, asset).await.unwrap();
    assert_eq!(h.balance(&bidder1), 10);
    assert_eq!(h.balance(&bidder2), 30);
    assert_eq!(h.balance(&h.vault), 0);
}

/// The winner of a sale can turn around and relist, auction or re-sell
/// the asset; custody and proceeds follow the new owner.
#[tokio::test]
async fn test_resale_chain() {
    let h = MarketHarness::new();
    let alice = h.participant(1, 0);
    let bob = h.participant(2, 100);
    let carol = h.participant(3, 150);
    let asset = h.mint(alice, 4);

    h.book.list(alice, asset, 100, 0).await.unwrap();
    h.book.purchase(bob, asset, 100).await.unwrap();

    h.book.relist(bob, asset, 150, 0).await.unwrap();
    h.book.purchase(carol, asset, 150).await.unwrap();

    assert_eq!(h.owner(&asset), Some(carol));
    assert_eq!(h.balance(&alice), 100);
    assert_eq!(h.balance(&bob), 150);
    assert_eq!(h.balance(&carol), 0);
}

/// The shared event log records one entry per observable transition, in
/// operation order.
#[tokio::test]
async fn test_event_stream_ordering() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let buyer = h.participant(2, 100);
    let asset = h.mint(seller, 5);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.book.purchase(buyer, asset, 100).await.unwrap();

    let events = h.events.snapshot();
    assert!(matches!(events[0], MarketEvent::ListingCreated { price: 100, .. }));
    assert!(matches!(events[1], MarketEvent::PurchaseSettled { price: 100, .. }));
}
