//! Unified read-only API over the market store.

use std::fmt::Debug;

use crate::{
    db_types::{Bid, MatchRequest, Slot},
    traits::{MarketQuery, MatchEngineError, SlotQueryFilter},
};

/// `MarketApi` serves the status projections the API layer and operator tooling read. Nothing in
/// here takes part in resolution.
pub struct MarketApi<B> {
    db: B,
}

impl<B: Debug> Debug for MarketApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarketApi ({:?})", self.db)
    }
}

impl<B> MarketApi<B>
where B: MarketQuery
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// The slot as currently persisted, or `None` if it does not exist.
    pub async fn slot_status(&self, slot_id: i64) -> Result<Option<Slot>, MatchEngineError> {
        self.db.fetch_slot(slot_id).await
    }

    /// The match request as currently persisted, or `None` if it does not exist.
    pub async fn request_status(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError> {
        self.db.fetch_match_request(request_id).await
    }

    /// Every bid ever placed against the slot, earliest first.
    pub async fn bids_for_slot(&self, slot_id: i64) -> Result<Vec<Bid>, MatchEngineError> {
        self.db.fetch_bids_for_slot(slot_id).await
    }

    /// The manual reconciliation queue: paid requests owed a refund that has not gone through.
    pub async fn pending_refunds(&self) -> Result<Vec<MatchRequest>, MatchEngineError> {
        self.db.fetch_pending_refunds().await
    }

    pub async fn search_slots(&self, filter: SlotQueryFilter) -> Result<Vec<Slot>, MatchEngineError> {
        self.db.search_slots(filter).await
    }
}
