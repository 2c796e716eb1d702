use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sme_common::Krw;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct StatusConversionError(String);

//--------------------------------------     SlotStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SlotStatus {
    /// The slot is open and accepting bids.
    Bidding,
    /// A winning bid has been accepted. Terminal.
    Matched,
    /// The bidding deadline passed without any bids. Terminal.
    Closed,
}

impl SlotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Matched | SlotStatus::Closed)
    }
}

impl Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotStatus::Bidding => write!(f, "Bidding"),
            SlotStatus::Matched => write!(f, "Matched"),
            SlotStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl FromStr for SlotStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bidding" => Ok(Self::Bidding),
            "Matched" => Ok(Self::Matched),
            "Closed" => Ok(Self::Closed),
            s => Err(StatusConversionError(format!("Invalid slot status: {s}"))),
        }
    }
}

//--------------------------------------      BidStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BidStatus {
    /// The bid is live and competing for the slot.
    Pending,
    /// The bid won the slot. At most one bid per slot ever carries this status.
    Accepted,
    /// The bid lost, either to a winner or because the slot closed.
    Rejected,
}

impl Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidStatus::Pending => write!(f, "Pending"),
            BidStatus::Accepted => write!(f, "Accepted"),
            BidStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for BidStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            s => Err(StatusConversionError(format!("Invalid bid status: {s}"))),
        }
    }
}

//--------------------------------------    RequestStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Created, but the introduction fee has not been confirmed yet.
    PendingPayment,
    /// Paid and waiting for the responder. The response deadline clock is running.
    Pending,
    /// The responder accepted the introduction.
    Accepted,
    /// The responder turned the introduction down. The fee becomes refundable.
    Rejected,
    /// The response deadline passed without an answer. The fee becomes refundable.
    Expired,
    /// The fee has been returned to the initiator. Terminal.
    Refunded,
    /// The two parties have exchanged contact details.
    ContactMade,
    /// The introduction ran its course. Terminal.
    Completed,
    /// Withdrawn by the initiator before a response. The fee becomes refundable.
    Cancelled,
}

impl RequestStatus {
    /// An active request blocks a new request between the same pair of users.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RequestStatus::PendingPayment |
                RequestStatus::Pending |
                RequestStatus::Accepted |
                RequestStatus::ContactMade
        )
    }

    /// Statuses from which a paid fee may be returned.
    pub fn is_refundable(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Expired | RequestStatus::Cancelled)
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::PendingPayment => write!(f, "PendingPayment"),
            RequestStatus::Pending => write!(f, "Pending"),
            RequestStatus::Accepted => write!(f, "Accepted"),
            RequestStatus::Rejected => write!(f, "Rejected"),
            RequestStatus::Expired => write!(f, "Expired"),
            RequestStatus::Refunded => write!(f, "Refunded"),
            RequestStatus::ContactMade => write!(f, "ContactMade"),
            RequestStatus::Completed => write!(f, "Completed"),
            RequestStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingPayment" => Ok(Self::PendingPayment),
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            "Expired" => Ok(Self::Expired),
            "Refunded" => Ok(Self::Refunded),
            "ContactMade" => Ok(Self::ContactMade),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(format!("Invalid match request status: {s}"))),
        }
    }
}

//--------------------------------------        Slot        ----------------------------------------------------------
/// A transferable pharmacy slot offered for competitive bidding. Slots are created by the listing
/// flow and only ever move forward: `Bidding` to `Matched` or `Closed`, never back.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    pub owner_id: i64,
    pub status: SlotStatus,
    /// When bidding closes. A slot without a deadline stays open until it auto-matches.
    pub bid_deadline: Option<DateTime<Utc>>,
    /// The reserve price. Required for auto-matching; informational otherwise.
    pub asking_price: Option<Krw>,
    /// When set, the first pending bid meeting the reserve wins immediately.
    pub auto_match: bool,
    pub bid_count: i64,
    pub matched_bidder_id: Option<i64>,
    pub matched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// Whether a new bid may be placed against this slot at `now`.
    pub fn is_biddable(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Bidding && self.bid_deadline.map(|d| now < d).unwrap_or(true)
    }
}

//--------------------------------------      NewSlot       ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub owner_id: i64,
    pub bid_deadline: Option<DateTime<Utc>>,
    pub asking_price: Option<Krw>,
    pub auto_match: bool,
    pub created_at: DateTime<Utc>,
}

impl NewSlot {
    pub fn new(owner_id: i64) -> Self {
        Self { owner_id, bid_deadline: None, asking_price: None, auto_match: false, created_at: Utc::now() }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.bid_deadline = Some(deadline);
        self
    }

    pub fn with_asking_price(mut self, price: Krw) -> Self {
        self.asking_price = Some(price);
        self
    }

    pub fn with_auto_match(mut self) -> Self {
        self.auto_match = true;
        self
    }
}

//--------------------------------------        Bid         ----------------------------------------------------------
/// A claim against a slot. Bids transition exactly once, at slot resolution time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub slot_id: i64,
    pub bidder_id: i64,
    pub amount: Krw,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewBid       ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewBid {
    pub slot_id: i64,
    pub bidder_id: i64,
    pub amount: Krw,
    /// The placement time. Recorded explicitly because it participates in tie-breaking.
    pub created_at: DateTime<Utc>,
}

impl NewBid {
    pub fn new(slot_id: i64, bidder_id: i64, amount: Krw) -> Self {
        Self { slot_id, bidder_id, amount, created_at: Utc::now() }
    }

    pub fn placed_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

//--------------------------------------    MatchRequest    ----------------------------------------------------------
/// A paid, deadline-bound one-to-one introduction offer between two parties.
///
/// `response_deadline` is stamped when the fee payment is confirmed and is never extended.
/// `refund_ref` is only ever set together with the `Refunded` status; a failed refund leaves the
/// prior status in place with the gateway failure recorded in `refund_failure`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: i64,
    pub initiator_id: i64,
    pub responder_id: i64,
    pub fee_payment_ref: Option<String>,
    pub fee_amount: Krw,
    pub status: RequestStatus,
    pub response_deadline: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub refund_ref: Option<String>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_failure: Option<String>,
    pub refund_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  NewMatchRequest   ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewMatchRequest {
    pub initiator_id: i64,
    pub responder_id: i64,
    /// The confirmed fee payment. Intake refuses requests without one.
    pub fee_payment_ref: Option<String>,
    pub fee_amount: Krw,
    pub created_at: DateTime<Utc>,
}

impl NewMatchRequest {
    pub fn new(initiator_id: i64, responder_id: i64, fee_amount: Krw) -> Self {
        Self { initiator_id, responder_id, fee_payment_ref: None, fee_amount, created_at: Utc::now() }
    }

    pub fn with_payment_ref<S: Into<String>>(mut self, payment_ref: S) -> Self {
        self.fee_payment_ref = Some(payment_ref.into());
        self
    }

    pub fn requested_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}
