use serde::{Deserialize, Serialize};

use crate::db_types::{Bid, MatchRequest, Slot};

/// A new bid has been stored against a slot. Subscribers typically notify the slot owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidPlacedEvent {
    pub slot: Slot,
    pub bid: Bid,
}

impl BidPlacedEvent {
    pub fn new(slot: Slot, bid: Bid) -> Self {
        Self { slot, bid }
    }
}

/// A bid that was the best offer on its slot has been beaten by a higher one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutbidEvent {
    pub slot: Slot,
    /// The bid that was overtaken.
    pub outbid: Bid,
    /// The bid that overtook it.
    pub new_bid: Bid,
}

impl OutbidEvent {
    pub fn new(slot: Slot, outbid: Bid, new_bid: Bid) -> Self {
        Self { slot, outbid, new_bid }
    }
}

/// A slot has been awarded to a winning bid. Fired exactly once per slot, from whichever
/// resolution path won the conditional transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMatchedEvent {
    pub slot: Slot,
    pub winner: Bid,
    pub rejected: Vec<Bid>,
}

impl SlotMatchedEvent {
    pub fn new(slot: Slot, winner: Bid, rejected: Vec<Bid>) -> Self {
        Self { slot, winner, rejected }
    }
}

/// A slot reached its deadline without a winner and has been closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClosedEvent {
    pub slot: Slot,
}

impl SlotClosedEvent {
    pub fn new(slot: Slot) -> Self {
        Self { slot }
    }
}

/// A match request ran out its response window without an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestExpiredEvent {
    pub request: MatchRequest,
}

impl RequestExpiredEvent {
    pub fn new(request: MatchRequest) -> Self {
        Self { request }
    }
}

/// A paid match request that did not lead to an introduction has had its fee returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRefundedEvent {
    pub request: MatchRequest,
}

impl RequestRefundedEvent {
    pub fn new(request: MatchRequest) -> Self {
        Self { request }
    }
}
