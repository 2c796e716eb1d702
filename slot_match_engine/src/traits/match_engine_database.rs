use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{Bid, MatchRequest, NewBid, NewMatchRequest, NewSlot, RequestStatus, Slot},
    traits::{data_objects::PurgeTotals, MarketQuery, SlotAward, SlotClosure},
};

/// The write-side contract a storage backend must fulfil to drive the matching engine.
///
/// Every `try_*` method is a conditional transition: it succeeds only if the row is still in the
/// expected source status, and returns `None` when a concurrent caller got there first. Losing
/// such a race is an expected outcome, not an error.
#[allow(async_fn_in_trait)]
pub trait MatchEngineDatabase: Clone + MarketQuery {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new slot. Slots arrive from the listing flow and start out in `Bidding`.
    async fn insert_slot(&self, slot: NewSlot) -> Result<Slot, MatchEngineError>;

    /// Atomically validates and stores a bid, and bumps the slot's bid counter.
    ///
    /// Fails with [`MatchEngineError::SlotNotBiddable`] if the slot is no longer in `Bidding` or
    /// its deadline has passed at `now`. Returns the slot as it was inside the transaction
    /// together with the stored bid.
    async fn place_bid(&self, bid: NewBid, now: DateTime<Utc>) -> Result<(Slot, Bid), MatchEngineError>;

    /// All `Pending` bids for the slot, earliest first.
    async fn pending_bids(&self, slot_id: i64) -> Result<Vec<Bid>, MatchEngineError>;

    /// The current best pending bid (highest amount, earliest placed among equals), if any.
    async fn highest_pending_bid(&self, slot_id: i64) -> Result<Option<Bid>, MatchEngineError>;

    /// Awards the slot to `winner` in a single transaction: the slot moves `Bidding → Matched`,
    /// the winning bid `Pending → Accepted`, and every other pending bid `Pending → Rejected`.
    ///
    /// Returns `None` without side effects if the slot already left `Bidding`.
    async fn try_award_slot(&self, slot_id: i64, winner: &Bid) -> Result<Option<SlotAward>, MatchEngineError>;

    /// Closes a slot that reached its deadline without bids: `Bidding → Closed`. Any pending bids
    /// found under the slot are rejected in the same transaction. Returns `None` on a lost race.
    async fn try_close_slot(&self, slot_id: i64) -> Result<Option<SlotClosure>, MatchEngineError>;

    /// `Bidding` slots whose deadline has passed at `now`.
    async fn due_slots(&self, now: DateTime<Utc>) -> Result<Vec<Slot>, MatchEngineError>;

    /// `Bidding` slots configured to auto-match that have at least one bid on record.
    async fn auto_match_slots(&self) -> Result<Vec<Slot>, MatchEngineError>;

    /// Stores a new match request with the given starting status and response deadline.
    ///
    /// Fails with [`MatchEngineError::DuplicateActiveRequest`] if an unresolved request already
    /// exists between the two parties, in either direction.
    async fn insert_match_request(
        &self,
        request: NewMatchRequest,
        status: RequestStatus,
        response_deadline: Option<DateTime<Utc>>,
    ) -> Result<MatchRequest, MatchEngineError>;

    /// `Pending` requests whose response deadline has passed at `now`.
    async fn due_requests(&self, now: DateTime<Utc>) -> Result<Vec<MatchRequest>, MatchEngineError>;

    /// `PendingPayment → Pending`, storing the confirmed payment reference and stamping the
    /// response deadline. The deadline is fixed here, at payment-confirmation time, for good.
    async fn try_confirm_request_payment(
        &self,
        request_id: i64,
        payment_ref: &str,
        response_deadline: DateTime<Utc>,
    ) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// `Pending → Expired`.
    async fn try_expire_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// `Pending → Accepted` or `Pending → Rejected`, stamping `responded_at`.
    async fn try_respond_request(
        &self,
        request_id: i64,
        accepted: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// `PendingPayment | Pending → Cancelled`. Only the initiator-facing surface calls this.
    async fn try_cancel_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// `Accepted → ContactMade`.
    async fn try_mark_contact_made(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// `Accepted | ContactMade → Completed`.
    async fn try_complete_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// Records a successful refund: status moves to `Refunded` and the gateway receipt is stamped
    /// into `refund_ref`/`refund_reason`/`refunded_at`, clearing any recorded failure.
    ///
    /// Conditional on the request still being in a refundable status with no refund recorded, so
    /// a duplicate compensation attempt no-ops with `None`.
    async fn try_mark_request_refunded(
        &self,
        request_id: i64,
        refund_ref: &str,
        reason: &str,
    ) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// Records a failed gateway cancel for manual reconciliation. The status is left untouched.
    async fn record_refund_failure(&self, request_id: i64, error: &str) -> Result<MatchRequest, MatchEngineError>;

    /// Deletes settled bids and match requests whose last update is older than `retention`.
    /// Requests still owed a refund are kept regardless of age.
    async fn purge_settled(&self, now: DateTime<Utc>, retention: Duration) -> Result<PurgeTotals, MatchEngineError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MatchEngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MatchEngineError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested slot {0} does not exist")]
    SlotNotFound(i64),
    #[error("Slot {id} is not accepting bids. {reason}")]
    SlotNotBiddable { id: i64, reason: String },
    #[error("The requested match request {0} does not exist")]
    RequestNotFound(i64),
    #[error("An active match request (#{existing}) already exists between users {initiator} and {responder}")]
    DuplicateActiveRequest { existing: i64, initiator: i64, responder: i64 },
    #[error("A match request needs a confirmed fee payment before it can be placed")]
    PaymentRequired,
}

impl From<sqlx::Error> for MatchEngineError {
    fn from(e: sqlx::Error) -> Self {
        MatchEngineError::DatabaseError(e.to_string())
    }
}
