//! Slot Matching Engine
//!
//! The matching and settlement core of the pharmacy slot marketplace. It allocates each
//! transferable slot to exactly one winning bid through competitive bidding, settles paid
//! one-to-one introduction requests under a hard response deadline, and returns the fee when an
//! introduction comes to nothing. The HTTP layer, the real payment provider and the notification
//! senders are collaborators, not residents: they talk to this crate through its traits and
//! event hooks.
//!
//! The library is divided into three main sections:
//! 1. The storage contracts and their SQLite implementation ([`mod@traits`], [`mod@sqlite`]). You
//!    should never need to touch the database directly; the exception is the persisted data types
//!    in [`mod@db_types`], which are public.
//! 2. The engine public API ([`MatchFlowApi`] and [`MarketApi`]): claim intake, the sweeps, the
//!    refund path and the read-only projections.
//! 3. The event hooks ([`mod@events`]): a small pub-sub layer through which subscribers hear
//!    about placed bids, matches, expiries and refunds. Publishing is fire-and-forget and can
//!    never fail or block a resolution.
//!
//! Every resolution step funnels through a conditional status transition executed in a single
//! store transaction, which is what makes concurrent sweeps, the auto-match fast path and
//! operator actions safe against each other: whoever commits the transition first wins, everyone
//! else no-ops.

pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
mod sme_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub mod sweep_worker;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sme_api::{
    errors::{CompensationError, MatchFlowError},
    flow_objects::{BidPlacement, CompensationOutcome, RequestSweepSummary, SlotSweepSummary},
    market_api::MarketApi,
    match_flow_api::MatchFlowApi,
    retry::RetryPolicy,
};
pub use traits::{
    MarketQuery,
    MatchEngineDatabase,
    MatchEngineError,
    NullGateway,
    PaymentGateway,
    SlotQueryFilter,
};
