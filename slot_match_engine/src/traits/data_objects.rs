use serde::{Deserialize, Serialize};

use crate::db_types::{Bid, Slot};

/// The result of a successful slot award transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAward {
    pub slot: Slot,
    pub winner: Bid,
    /// The pending bids that lost to the winner, already marked `Rejected`.
    pub rejected: Vec<Bid>,
}

/// The result of closing a slot that attracted no viable bids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotClosure {
    pub slot: Slot,
    /// Pending bids swept up by the close. Normally empty; populated only if a bid slipped in
    /// between the due-scan and the close transaction.
    pub rejected: Vec<Bid>,
}

/// Row counts removed by a retention purge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PurgeTotals {
    pub bids: u64,
    pub requests: u64,
}

impl PurgeTotals {
    pub fn total(&self) -> u64 {
        self.bids + self.requests
    }
}
