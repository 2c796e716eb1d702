use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Bid, MatchRequest},
    traits::{SlotAward, SlotClosure},
};

/// What happened when a bid was taken in. The award is populated when the slot auto-matched on
/// the spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidPlacement {
    pub bid: Bid,
    pub award: Option<SlotAward>,
}

/// The result of one pass over the due and auto-match slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotSweepSummary {
    pub matched: Vec<SlotAward>,
    pub closed: Vec<SlotClosure>,
    /// Slots another resolution attempt got to first. Expected under concurrency, not a problem.
    pub races_lost: u64,
    /// Slots whose processing failed. The rest of the batch carries on regardless.
    pub failures: u64,
}

impl SlotSweepSummary {
    pub fn resolved_count(&self) -> usize {
        self.matched.len() + self.closed.len()
    }

    pub fn merge(&mut self, other: SlotSweepSummary) {
        self.matched.extend(other.matched);
        self.closed.extend(other.closed);
        self.races_lost += other.races_lost;
        self.failures += other.failures;
    }
}

/// The result of one pass over the match requests whose response deadline has lapsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestSweepSummary {
    pub expired: Vec<MatchRequest>,
    pub refunded: Vec<MatchRequest>,
    /// Requests whose gateway cancel failed, with the recorded error. These stay in the
    /// reconciliation queue for a manual retry.
    pub refund_failures: Vec<(i64, String)>,
    pub races_lost: u64,
    pub failures: u64,
}

impl RequestSweepSummary {
    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }

    pub fn refunded_count(&self) -> usize {
        self.refunded.len()
    }
}

/// How a compensation call concluded. `AlreadyRefunded` means the pre-check found a completed
/// refund and no gateway call was made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompensationOutcome {
    Refunded(MatchRequest),
    AlreadyRefunded(MatchRequest),
}

impl CompensationOutcome {
    pub fn request(&self) -> &MatchRequest {
        match self {
            CompensationOutcome::Refunded(r) | CompensationOutcome::AlreadyRefunded(r) => r,
        }
    }

    pub fn into_request(self) -> MatchRequest {
        match self {
            CompensationOutcome::Refunded(r) | CompensationOutcome::AlreadyRefunded(r) => r,
        }
    }
}
