//! Offer-book scenarios across multiple competing buyers.

use bazaar::MarketError;

use crate::common::MarketHarness;

const HOUR: u64 = 3_600;

/// Accepting one of N active offers deactivates all of them, refunds the
/// other N-1 in full and settles at the accepted amount.
#[tokio::test]
async fn test_accept_one_of_many_offers() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let asset = h.mint(seller, 1);
    h.book.list(seller, asset, 100, 0).await.unwrap();

    let bidders: Vec<_> = (2..7)
        .map(|i| h.participant(i, 50 + i as u64))
        .collect();
    for (i, bidder) in bidders.iter().enumerate() {
        let amount = 50 + (i as u64 + 2);
        h.book
            .make_offer(*bidder, asset, amount, HOUR, amount)
            .await
            .unwrap();
    }

    // Accept the middle offer.
    h.book.accept_offer(seller, asset, 2).await.unwrap();

    assert_eq!(h.owner(&asset), Some(bidders[2]));
    assert_eq!(h.balance(&seller), 54);
    for (i, bidder) in bidders.iter().enumerate() {
        let expected = if i == 2 { 0 } else { 50 + (i as u64 + 2) };
        assert_eq!(h.balance(bidder), expected, "bidder {i}");
    }
    assert!(h.book.offers(&asset).await.iter().all(|o| !o.active));
    assert_eq!(h.balance(&h.vault), 0);
}

/// A cancelled offer's index stays occupied, so later offers keep their
/// positions and a stale accept hits the inactive record.
#[tokio::test]
async fn test_offer_indices_are_stable() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let alice = h.participant(2, 60);
    let bob = h.participant(3, 70);
    let asset = h.mint(seller, 1);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.book.make_offer(alice, asset, 60, HOUR, 60).await.unwrap();
    let bob_index = h.book.make_offer(bob, asset, 70, HOUR, 70).await.unwrap();
    h.book.cancel_offer(alice, asset, 0).await.unwrap();

    let err = h.book.accept_offer(seller, asset, 0).await.unwrap_err();
    assert!(matches!(err, MarketError::OfferInactive));

    h.book.accept_offer(seller, asset, bob_index).await.unwrap();
    assert_eq!(h.owner(&asset), Some(bob));
}

/// An expired offer cannot be accepted, but its escrow is recoverable by
/// cancellation and is refunded if the listing sells to someone else.
#[tokio::test]
async fn test_expired_offer_escrow_is_never_stranded() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let offerer = h.participant(2, 60);
    let buyer = h.participant(3, 100);
    let asset = h.mint(seller, 1);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.book.make_offer(offerer, asset, 60, HOUR, 60).await.unwrap();
    h.advance_time(2 * HOUR);

    let err = h.book.accept_offer(seller, asset, 0).await.unwrap_err();
    assert!(matches!(err, MarketError::OfferExpired));

    // A sale to another buyer refunds the expired offer's escrow too.
    h.book.purchase(buyer, asset, 100).await.unwrap();
    assert_eq!(h.balance(&offerer), 60);
}

/// Delisting refunds every active offer along with returning custody.
#[tokio::test]
async fn test_delist_refunds_open_offers() {
    let h = MarketHarness::new();
    let seller = h.participant(1, 0);
    let alice = h.participant(2, 60);
    let bob = h.participant(3, 70);
    let asset = h.mint(seller, 1);

    h.book.list(seller, asset, 100, 0).await.unwrap();
    h.book.make_offer(alice, asset, 60, HOUR, 60).await.unwrap();
    h.book.make_offer(bob, asset, 70, HOUR, 70).await.unwrap();

    h.book.delist(seller, asset).await.unwrap();

    assert_eq!(h.owner(&asset), Some(seller));
    assert_eq!(h.balance(&alice), 60);
    assert_eq!(h.balance(&bob), 70);
    assert_eq!(h.balance(&h.vault), 0);
}
