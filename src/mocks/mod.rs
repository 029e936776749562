//! In-memory collaborator implementations.
//!
//! These double as the unit-test environment and as a local reference
//! environment: an in-memory Asset Registry, a currency ledger with
//! failure injection, and a controllable clock.

pub mod ledger;
pub mod registry;
pub mod time;

pub use ledger::MockLedger;
pub use registry::MockAssetRegistry;
pub use time::MockTime;

use crate::ids::{AssetKey, CollectionId, ParticipantId};

/// Deterministic participant id for tests.
pub fn make_test_participant(n: u8) -> ParticipantId {
    ParticipantId([n; 32])
}

/// Deterministic collection id for tests.
pub fn make_test_collection(n: u8) -> CollectionId {
    CollectionId([n; 32])
}

/// Deterministic asset key for tests.
pub fn make_test_asset(collection: u8, token: u64) -> AssetKey {
    AssetKey::new(make_test_collection(collection), token)
}
