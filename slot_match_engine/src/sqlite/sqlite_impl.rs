//! `SqliteDatabase` is a concrete implementation of a matching engine backend.
//!
//! It implements the traits in the [`crate::traits`] module on top of SQLite. The row-level work
//! is delegated to the functions in [`super::db`]; this type owns the transaction boundaries, and
//! in particular guarantees that every resolution is a single atomic transaction anchored on a
//! conditional status transition.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{bids, db_url, match_requests, new_pool, slots};
use crate::{
    db_types::{Bid, MatchRequest, NewBid, NewMatchRequest, NewSlot, RequestStatus, Slot},
    traits::{
        MarketQuery,
        MatchEngineDatabase,
        MatchEngineError,
        PurgeTotals,
        SlotAward,
        SlotClosure,
        SlotQueryFilter,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool for the URL in `SME_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, MatchEngineError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MatchEngineError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl MatchEngineDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_slot(&self, slot: NewSlot) -> Result<Slot, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let slot = slots::insert_slot(slot, &mut conn).await?;
        debug!("🗃️ Slot #{} listed by user {}", slot.id, slot.owner_id);
        Ok(slot)
    }

    async fn place_bid(&self, bid: NewBid, now: DateTime<Utc>) -> Result<(Slot, Bid), MatchEngineError> {
        let mut tx = self.pool.begin().await?;
        let slot = slots::fetch_slot(bid.slot_id, &mut tx)
            .await?
            .ok_or(MatchEngineError::SlotNotFound(bid.slot_id))?;
        if !slot.is_biddable(now) {
            let reason = if slot.status.is_terminal() {
                format!("The slot is already {}", slot.status)
            } else {
                "The bidding deadline has passed".to_string()
            };
            return Err(MatchEngineError::SlotNotBiddable { id: slot.id, reason });
        }
        let bid = bids::insert_bid(bid, &mut tx).await?;
        slots::increment_bid_count(slot.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Bid #{} of {} stored against slot #{}", bid.id, bid.amount, bid.slot_id);
        Ok((slot, bid))
    }

    async fn pending_bids(&self, slot_id: i64) -> Result<Vec<Bid>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_pending_bids(slot_id, &mut conn).await?;
        Ok(bids)
    }

    async fn highest_pending_bid(&self, slot_id: i64) -> Result<Option<Bid>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::fetch_highest_pending_bid(slot_id, &mut conn).await?;
        Ok(bid)
    }

    async fn try_award_slot(&self, slot_id: i64, winner: &Bid) -> Result<Option<SlotAward>, MatchEngineError> {
        let mut tx = self.pool.begin().await?;
        // The slot transition is the linchpin: whichever transaction flips Bidding → Matched
        // first wins, and every other resolution attempt observes the new status and no-ops.
        let slot = match slots::try_transition_to_matched(slot_id, winner.bidder_id, &mut tx).await? {
            Some(slot) => slot,
            None => {
                debug!("🗃️ Slot #{slot_id} already resolved. Award attempt abandoned.");
                return Ok(None);
            },
        };
        let accepted = match bids::try_accept_bid(winner.id, &mut tx).await? {
            Some(bid) => bid,
            None => {
                // Bids only leave Pending when their slot resolves, and we just held the slot in
                // Bidding. Dropping the transaction rolls the slot transition back.
                warn!("🗃️ Bid #{} was not pending while its slot #{slot_id} was. Rolling back.", winner.id);
                return Ok(None);
            },
        };
        let rejected = bids::reject_other_pending_bids(slot_id, accepted.id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Slot #{slot_id} matched to bid #{} ({}). {} competing bids rejected.",
            accepted.id,
            accepted.amount,
            rejected.len()
        );
        Ok(Some(SlotAward { slot, winner: accepted, rejected }))
    }

    async fn try_close_slot(&self, slot_id: i64) -> Result<Option<SlotClosure>, MatchEngineError> {
        let mut tx = self.pool.begin().await?;
        let slot = match slots::try_transition_to_closed(slot_id, &mut tx).await? {
            Some(slot) => slot,
            None => {
                debug!("🗃️ Slot #{slot_id} already resolved. Close attempt abandoned.");
                return Ok(None);
            },
        };
        let rejected = bids::reject_all_pending_bids(slot_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Slot #{slot_id} closed without a winner");
        Ok(Some(SlotClosure { slot, rejected }))
    }

    async fn due_slots(&self, now: DateTime<Utc>) -> Result<Vec<Slot>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let slots = slots::fetch_due_slots(now, &mut conn).await?;
        Ok(slots)
    }

    async fn auto_match_slots(&self) -> Result<Vec<Slot>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let slots = slots::fetch_auto_match_slots(&mut conn).await?;
        Ok(slots)
    }

    async fn insert_match_request(
        &self,
        request: NewMatchRequest,
        status: RequestStatus,
        response_deadline: Option<DateTime<Utc>>,
    ) -> Result<MatchRequest, MatchEngineError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) =
            match_requests::fetch_active_request_between(request.initiator_id, request.responder_id, &mut tx).await?
        {
            return Err(MatchEngineError::DuplicateActiveRequest {
                existing: existing.id,
                initiator: request.initiator_id,
                responder: request.responder_id,
            });
        }
        let request = match_requests::insert_request(request, status, response_deadline, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Match request #{} stored as {}", request.id, request.status);
        Ok(request)
    }

    async fn due_requests(&self, now: DateTime<Utc>) -> Result<Vec<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let requests = match_requests::fetch_due_requests(now, &mut conn).await?;
        Ok(requests)
    }

    async fn try_confirm_request_payment(
        &self,
        request_id: i64,
        payment_ref: &str,
        response_deadline: DateTime<Utc>,
    ) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_confirm_payment(request_id, payment_ref, response_deadline, &mut conn).await?;
        Ok(request)
    }

    async fn try_expire_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_expire(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn try_respond_request(
        &self,
        request_id: i64,
        accepted: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_respond(request_id, accepted, now, &mut conn).await?;
        Ok(request)
    }

    async fn try_cancel_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_cancel(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn try_mark_contact_made(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_mark_contact_made(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn try_complete_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_complete(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn try_mark_request_refunded(
        &self,
        request_id: i64,
        refund_ref: &str,
        reason: &str,
    ) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::try_mark_refunded(request_id, refund_ref, reason, &mut conn).await?;
        Ok(request)
    }

    async fn record_refund_failure(&self, request_id: i64, error: &str) -> Result<MatchRequest, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::record_refund_failure(request_id, error, &mut conn).await?;
        Ok(request)
    }

    async fn purge_settled(&self, now: DateTime<Utc>, retention: Duration) -> Result<PurgeTotals, MatchEngineError> {
        let retention_secs = retention.num_seconds();
        let mut tx = self.pool.begin().await?;
        let bids = bids::purge_settled_bids(now, retention_secs, &mut tx).await?;
        let requests = match_requests::purge_settled_requests(now, retention_secs, &mut tx).await?;
        tx.commit().await?;
        Ok(PurgeTotals { bids, requests })
    }

    async fn close(&mut self) -> Result<(), MatchEngineError> {
        self.pool.close().await;
        Ok(())
    }
}

impl MarketQuery for SqliteDatabase {
    async fn fetch_slot(&self, slot_id: i64) -> Result<Option<Slot>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let slot = slots::fetch_slot(slot_id, &mut conn).await?;
        Ok(slot)
    }

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let bid = bids::fetch_bid(bid_id, &mut conn).await?;
        Ok(bid)
    }

    async fn fetch_bids_for_slot(&self, slot_id: i64) -> Result<Vec<Bid>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let bids = bids::fetch_bids_for_slot(slot_id, &mut conn).await?;
        Ok(bids)
    }

    async fn fetch_match_request(&self, request_id: i64) -> Result<Option<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let request = match_requests::fetch_request(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn fetch_pending_refunds(&self) -> Result<Vec<MatchRequest>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let requests = match_requests::fetch_pending_refunds(&mut conn).await?;
        Ok(requests)
    }

    async fn search_slots(&self, filter: SlotQueryFilter) -> Result<Vec<Slot>, MatchEngineError> {
        let mut conn = self.pool.acquire().await?;
        let slots = slots::search_slots(filter, &mut conn).await?;
        Ok(slots)
    }
}
