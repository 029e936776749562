/// Domain-specific error types for the marketplace engine.
///
/// Variants are grouped by when they can occur: validation, authorization
/// and state-consistency errors are all rejected before any state change;
/// the interaction variants (`Custody`, `Transfer`) are the only errors
/// raised after local bookkeeping has been staged, and every operation that
/// can hit one rolls its staged effects back before returning it.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    // Validation
    #[error("price must be greater than zero")]
    InvalidPrice,

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("duration {actual}s outside allowed window {min}s..={max}s")]
    InvalidDuration { actual: u64, min: u64, max: u64 },

    // Authorization
    #[error("caller does not own the asset")]
    NotOwner,

    #[error("engine is not authorized to take custody of the asset")]
    NotAuthorized,

    #[error("caller is not the seller")]
    NotSeller,

    #[error("caller is not the offer's buyer")]
    NotBuyer,

    #[error("seller cannot bid on their own sale")]
    SelfBid,

    // State consistency
    #[error("not found: {0}")]
    NotFound(String),

    #[error("asset is already listed or under auction")]
    AlreadyListed,

    #[error("listing has already been sold")]
    AlreadySold,

    #[error("payment of {paid} does not match required {required}")]
    WrongAmount { required: u64, paid: u64 },

    #[error("offer index {0} out of range")]
    InvalidIndex(usize),

    #[error("offer has expired")]
    OfferExpired,

    #[error("offer is no longer active")]
    OfferInactive,

    #[error("auction has already ended")]
    AuctionEnded,

    #[error("auction is still active")]
    AuctionActive,

    #[error("auction already has bids")]
    BidsPlaced,

    #[error("bid of {bid} does not beat {floor}")]
    BidTooLow { bid: u64, floor: u64 },

    #[error("bidder has already committed to this auction")]
    AlreadyCommitted,

    #[error("commit phase is closed")]
    CommitClosed,

    #[error("outside the reveal window")]
    RevealClosed,

    #[error("no commitment from this bidder")]
    NoCommitment,

    #[error("commitment has already been revealed")]
    AlreadyRevealed,

    #[error("revealed bid does not match the stored commitment")]
    CommitmentMismatch,

    #[error("revealed amount {amount} exceeds escrowed ceiling {escrowed}")]
    EscrowExceeded { amount: u64, escrowed: u64 },

    #[error("no pending return to withdraw")]
    NothingToWithdraw,

    // Interaction failures — the whole operation is rolled back.
    #[error("asset custody transfer failed: {0}")]
    Custody(String),

    #[error("fund transfer failed: {0}")]
    Transfer(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience type alias.
pub type MarketResult<T> = Result<T, MarketError>;
