//! Multi-party test harness for integration testing.
//!
//! Bundles the in-memory collaborators with all three selling components
//! sharing one vault, one policy, one clock and one event log, so a test
//! reads like a sequence of caller operations.

use bazaar::mocks::{
    make_test_asset, make_test_participant, MockAssetRegistry, MockLedger, MockTime,
};
use bazaar::{
    AssetKey, AuctionHouse, EventLog, ListingBook, MarketEvent, MarketPolicy, ParticipantId,
    PayoutEngine, SealedAuctionHouse,
};

pub struct MarketHarness {
    pub registry: MockAssetRegistry,
    pub ledger: MockLedger,
    pub time: MockTime,
    pub events: EventLog,
    pub book: ListingBook<MockAssetRegistry, MockLedger, MockTime>,
    pub auctions: AuctionHouse<MockAssetRegistry, MockLedger, MockTime>,
    pub sealed: SealedAuctionHouse<MockAssetRegistry, MockLedger, MockTime>,
    pub vault: ParticipantId,
    pub fee_account: ParticipantId,
}

#[allow(dead_code)]
impl MarketHarness {
    pub fn new() -> Self {
        Self::with_policy(MarketPolicy::default())
    }

    pub fn with_policy(policy: MarketPolicy) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let events = EventLog::new();
        let registry = MockAssetRegistry::new().with_events(events.clone());
        let ledger = MockLedger::new();
        let time = MockTime::new(1_000);
        let vault = make_test_participant(250);
        let fee_account = make_test_participant(251);

        let engine = PayoutEngine::new(
            registry.clone(),
            ledger.clone(),
            vault,
            fee_account,
            policy,
            events.clone(),
        );
        let book = ListingBook::new(engine.clone(), time.clone());
        let auctions = AuctionHouse::new(engine.clone(), time.clone());
        let sealed = SealedAuctionHouse::new(engine, time.clone());

        Self {
            registry,
            ledger,
            time,
            events,
            book,
            auctions,
            sealed,
            vault,
            fee_account,
        }
    }

    /// A participant with the given balance, authorized to trade through
    /// the vault.
    pub fn participant(&self, id: u8, funds: u64) -> ParticipantId {
        let who = make_test_participant(id);
        if funds > 0 {
            self.ledger.credit(&who, funds);
        }
        self.registry.set_authorization(who, self.vault, true);
        who
    }

    /// Mint an asset in collection 1 for an owner.
    pub fn mint(&self, owner: ParticipantId, token: u64) -> AssetKey {
        let asset = make_test_asset(1, token);
        self.registry.mint(asset, owner);
        asset
    }

    /// Configure a royalty on collection 1.
    pub fn set_royalty(&self, receiver: ParticipantId, bps: u64) {
        self.registry
            .set_royalty(make_test_asset(1, 0).collection, receiver, bps);
    }

    pub fn balance(&self, who: &ParticipantId) -> u64 {
        self.ledger.balance(who)
    }

    pub fn owner(&self, asset: &AssetKey) -> Option<ParticipantId> {
        self.registry.owner(asset)
    }

    pub fn advance_time(&self, seconds: u64) {
        self.time.advance(seconds);
    }

    /// Events of the matching kind, in order.
    pub fn events_where(&self, pred: impl Fn(&MarketEvent) -> bool) -> Vec<MarketEvent> {
        self.events.snapshot().into_iter().filter(pred).collect()
    }
}
