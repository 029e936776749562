//! Trait abstractions for external collaborators.
//!
//! The marketplace core never owns asset records or currency balances; it
//! moves value through these seams. Trait-based abstraction keeps the
//! engines unit-testable against in-memory collaborators.

pub mod ledger;
pub mod registry;
pub mod time;

pub use ledger::CurrencyLedger;
pub use registry::{AssetRegistry, RoyaltySplit};
pub use time::TimeProvider;

// Re-export default implementations
pub use time::SystemTimeProvider;
