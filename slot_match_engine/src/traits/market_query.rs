use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Bid, MatchRequest, Slot, SlotStatus},
    traits::MatchEngineError,
};

/// Read-only projections over the store. The API layer and operator tooling consume these; none
/// of them take part in resolution and none of them may block it.
#[allow(async_fn_in_trait)]
pub trait MarketQuery {
    async fn fetch_slot(&self, slot_id: i64) -> Result<Option<Slot>, MatchEngineError>;

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MatchEngineError>;

    /// Every bid ever placed against the slot, earliest first.
    async fn fetch_bids_for_slot(&self, slot_id: i64) -> Result<Vec<Bid>, MatchEngineError>;

    async fn fetch_match_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError>;

    /// Paid requests in a refundable status with no refund on record — the reconciliation queue
    /// an operator works through when gateway cancels have failed.
    async fn fetch_pending_refunds(&self) -> Result<Vec<MatchRequest>, MatchEngineError>;

    /// Fetches slots according to the criteria in the filter, ordered by creation time.
    async fn search_slots(&self, filter: SlotQueryFilter) -> Result<Vec<Slot>, MatchEngineError>;
}

/// Filter criteria for [`MarketQuery::search_slots`]. Empty fields are not constrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotQueryFilter {
    pub owner_id: Option<i64>,
    pub status: Option<Vec<SlotStatus>>,
    pub auto_match: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SlotQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.owner_id.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.auto_match.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }

    pub fn with_owner_id(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_status(mut self, status: SlotStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_auto_match(mut self, auto_match: bool) -> Self {
        self.auto_match = Some(auto_match);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}
