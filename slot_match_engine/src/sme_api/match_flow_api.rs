use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{Bid, MatchRequest, NewBid, NewMatchRequest, RequestStatus, Slot},
    events::{
        BidPlacedEvent,
        EventProducers,
        OutbidEvent,
        RequestExpiredEvent,
        RequestRefundedEvent,
        SlotClosedEvent,
        SlotMatchedEvent,
    },
    helpers::{deadline_winner, first_qualifying, is_response_overdue},
    sme_api::{
        errors::{CompensationError, MatchFlowError},
        flow_objects::{BidPlacement, CompensationOutcome, RequestSweepSummary, SlotSweepSummary},
        retry::RetryPolicy,
    },
    traits::{MatchEngineDatabase, MatchEngineError, PaymentGateway, PurgeTotals, SlotAward, SlotClosure},
};

/// `MatchFlowApi` is the primary API for taking in claims and resolving them: bids against slots,
/// paid introduction requests, the sweeps that settle both when their deadlines lapse, and the
/// refunds owed when a paid request comes to nothing.
///
/// Every resolution ultimately funnels through one of the store's conditional transitions, so any
/// number of `MatchFlowApi` instances (fast path, sweep workers, operator tooling) can run against
/// the same store concurrently without double-awarding a slot or double-refunding a fee. Losing
/// one of those races is an expected no-op, logged at debug level.
pub struct MatchFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for MatchFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchFlowApi")
    }
}

impl<B, G> MatchFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B, G> MatchFlowApi<B, G>
where
    B: MatchEngineDatabase,
    G: PaymentGateway,
{
    //------------------------------------      Claim intake      -----------------------------------------------------

    /// Takes in a new bid.
    ///
    /// The bid is validated and stored against the slot (failing with
    /// [`MatchEngineError::SlotNotBiddable`] if the slot has resolved or its deadline has passed),
    /// the slot owner and any overtaken best bidder are notified through the event hooks, and on
    /// an auto-match slot the reserve is evaluated inline so a qualifying bid wins on the spot
    /// instead of waiting for the sweep.
    pub async fn place_bid(&self, bid: NewBid) -> Result<BidPlacement, MatchFlowError> {
        let best_before = self.db.highest_pending_bid(bid.slot_id).await?;
        let placed_at = bid.created_at;
        let (slot, bid) = self.db.place_bid(bid, placed_at).await?;
        info!("🔄️ Bid #{} of {} placed against slot #{}", bid.id, bid.amount, slot.id);
        self.call_bid_placed_hook(&slot, &bid).await;
        if let Some(prev) = best_before {
            if bid.amount > prev.amount {
                self.call_outbid_hook(&slot, &prev, &bid).await;
            }
        }
        let award = if slot.auto_match { self.try_auto_match(&slot).await? } else { None };
        Ok(BidPlacement { bid, award })
    }

    /// Takes in a new, paid introduction request.
    ///
    /// Fails with [`MatchEngineError::PaymentRequired`] when no confirmed fee payment accompanies
    /// the request, and with [`MatchEngineError::DuplicateActiveRequest`] when an unresolved
    /// request already exists between the two parties. The response deadline is stamped as
    /// `created_at + response_window` and never moves again.
    pub async fn place_match_request(
        &self,
        request: NewMatchRequest,
        response_window: Duration,
    ) -> Result<MatchRequest, MatchFlowError> {
        if request.fee_payment_ref.is_none() {
            return Err(MatchEngineError::PaymentRequired.into());
        }
        let deadline = request.created_at + response_window;
        let request = self.db.insert_match_request(request, RequestStatus::Pending, Some(deadline)).await?;
        info!("🔄️ Match request #{} placed. Response due by {}", request.id, deadline);
        Ok(request)
    }

    /// Registers a request whose fee has not been collected yet. It sits in `PendingPayment`,
    /// without a response deadline, until [`Self::confirm_request_payment`] moves it along. The
    /// duplicate-pair check applies here too.
    pub async fn register_unpaid_request(&self, request: NewMatchRequest) -> Result<MatchRequest, MatchFlowError> {
        let request = self.db.insert_match_request(request, RequestStatus::PendingPayment, None).await?;
        debug!("🔄️ Match request #{} registered, awaiting fee payment", request.id);
        Ok(request)
    }

    /// Confirms the fee payment for a `PendingPayment` request. The response clock starts now:
    /// the deadline becomes `now + response_window`, fixed for the life of the request.
    pub async fn confirm_request_payment(
        &self,
        request_id: i64,
        payment_ref: &str,
        now: DateTime<Utc>,
        response_window: Duration,
    ) -> Result<MatchRequest, MatchFlowError> {
        let deadline = now + response_window;
        match self.db.try_confirm_request_payment(request_id, payment_ref, deadline).await? {
            Some(request) => {
                info!("🔄️ Match request #{request_id} paid. Response due by {deadline}");
                Ok(request)
            },
            None => Err(self.request_not_actionable(request_id).await),
        }
    }

    //------------------------------------    Responder actions    ----------------------------------------------------

    /// Records the responder's answer. A declined request immediately enters the refund path;
    /// the caller gets the request as it stands after that attempt, truthful status included.
    pub async fn respond_to_request(
        &self,
        request_id: i64,
        accepted: bool,
        now: DateTime<Utc>,
    ) -> Result<MatchRequest, MatchFlowError> {
        let request = match self.db.try_respond_request(request_id, accepted, now).await? {
            Some(request) => request,
            None => return Err(self.request_not_actionable(request_id).await),
        };
        info!("🔄️ Match request #{request_id} {} by the responder", if accepted { "accepted" } else { "declined" });
        if accepted {
            return Ok(request);
        }
        self.refund_if_paid(request).await
    }

    /// Withdraws a request on the initiator's behalf, refunding the fee if one was collected.
    pub async fn cancel_request(&self, request_id: i64) -> Result<MatchRequest, MatchFlowError> {
        let request = match self.db.try_cancel_request(request_id).await? {
            Some(request) => request,
            None => return Err(self.request_not_actionable(request_id).await),
        };
        info!("🔄️ Match request #{request_id} cancelled by the initiator");
        self.refund_if_paid(request).await
    }

    /// `Accepted → ContactMade`.
    pub async fn mark_contact_made(&self, request_id: i64) -> Result<MatchRequest, MatchFlowError> {
        match self.db.try_mark_contact_made(request_id).await? {
            Some(request) => Ok(request),
            None => Err(self.request_not_actionable(request_id).await),
        }
    }

    /// `Accepted | ContactMade → Completed`.
    pub async fn complete_request(&self, request_id: i64) -> Result<MatchRequest, MatchFlowError> {
        match self.db.try_complete_request(request_id).await? {
            Some(request) => Ok(request),
            None => Err(self.request_not_actionable(request_id).await),
        }
    }

    //------------------------------------         Sweeps         -----------------------------------------------------

    /// One pass over the `Bidding` slots whose deadline has lapsed at `now`. The best pending bid
    /// wins each slot; a slot without pending bids is closed. One slot failing does not stop the
    /// rest of the batch.
    pub async fn sweep_due_slots(&self, now: DateTime<Utc>) -> Result<SlotSweepSummary, MatchEngineError> {
        let due = self.db.due_slots(now).await?;
        let mut summary = SlotSweepSummary::default();
        for slot in due {
            if let Err(e) = self.resolve_due_slot(&slot, &mut summary).await {
                summary.failures += 1;
                error!("🔄️ Failed to resolve slot #{}: {e}", slot.id);
            }
        }
        Ok(summary)
    }

    /// One pass over the auto-match slots that have bids on record, awarding each to its first
    /// qualifying offer where one exists.
    pub async fn sweep_auto_match_slots(&self) -> Result<SlotSweepSummary, MatchEngineError> {
        let slots = self.db.auto_match_slots().await?;
        let mut summary = SlotSweepSummary::default();
        for slot in slots {
            match self.try_auto_match(&slot).await {
                Ok(Some(award)) => summary.matched.push(award),
                Ok(None) => {},
                Err(e) => {
                    summary.failures += 1;
                    error!("🔄️ Auto-match evaluation of slot #{} failed: {e}", slot.id);
                },
            }
        }
        Ok(summary)
    }

    /// One pass over the `Pending` requests whose response deadline has lapsed at `now`. Each is
    /// expired and, when paid, handed straight to the refund path in the same logical operation.
    pub async fn sweep_due_requests(&self, now: DateTime<Utc>) -> Result<RequestSweepSummary, MatchEngineError> {
        let due = self.db.due_requests(now).await?;
        let mut summary = RequestSweepSummary::default();
        for request in due {
            if let Err(e) = self.expire_and_compensate(&request, now, &mut summary).await {
                summary.failures += 1;
                error!("🔄️ Failed to expire match request #{}: {e}", request.id);
            }
        }
        Ok(summary)
    }

    /// Runs every sweep once, immediately. The operational escape hatch: idempotent with the
    /// periodic workers, so an operator can force a pass at any time.
    pub async fn run_sweep_once(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(SlotSweepSummary, RequestSweepSummary), MatchEngineError> {
        let mut slots = self.sweep_auto_match_slots().await?;
        slots.merge(self.sweep_due_slots(now).await?);
        let requests = self.sweep_due_requests(now).await?;
        Ok((slots, requests))
    }

    /// Deletes settled bids and requests older than `retention`. Hygiene only; requests still
    /// owed a refund are kept whatever their age.
    pub async fn purge_settled(&self, now: DateTime<Utc>, retention: Duration) -> Result<PurgeTotals, MatchEngineError> {
        let totals = self.db.purge_settled(now, retention).await?;
        if totals.total() > 0 {
            info!("🔄️ Purged {} settled bids and {} settled match requests", totals.bids, totals.requests);
        }
        Ok(totals)
    }

    //------------------------------------      Compensation      -----------------------------------------------------

    /// Refunds the fee of a request that did not lead to an introduction.
    ///
    /// The persisted status is re-checked before the gateway is touched: an already-`Refunded`
    /// request returns [`CompensationOutcome::AlreadyRefunded`] without a second gateway call, so
    /// duplicate sweeps and retries cannot double-refund. On success the refund receipt is
    /// stamped onto the request; on gateway failure the request keeps its truthful status and the
    /// failure is recorded for the reconciliation queue.
    ///
    /// The sweep, the responder-reject path and the operator's manual retry all share this one
    /// routine.
    pub async fn compensate(&self, request_id: i64) -> Result<CompensationOutcome, CompensationError> {
        let request = self
            .db
            .fetch_match_request(request_id)
            .await
            .map_err(|e| CompensationError::DatabaseError(e.to_string()))?
            .ok_or(CompensationError::RequestNotFound(request_id))?;
        if request.status == RequestStatus::Refunded {
            debug!("💸️ Match request #{request_id} is already refunded. No gateway call made.");
            return Ok(CompensationOutcome::AlreadyRefunded(request));
        }
        if !request.status.is_refundable() {
            return Err(CompensationError::NotRefundable { id: request_id, status: request.status });
        }
        let payment_ref = match &request.fee_payment_ref {
            Some(payment_ref) => payment_ref.clone(),
            None => return Err(CompensationError::NoPaymentToRefund(request_id)),
        };
        let reason = refund_reason(request.status);
        match self.gateway.cancel(&payment_ref, reason, Some(request.fee_amount)).await {
            Ok(receipt) => {
                match self.db.try_mark_request_refunded(request_id, &receipt.refund_ref, reason).await? {
                    Some(refunded) => {
                        info!(
                            "💸️ Fee of {} for match request #{request_id} refunded under [{}]",
                            refunded.fee_amount, receipt.refund_ref
                        );
                        self.call_request_refunded_hook(&refunded).await;
                        Ok(CompensationOutcome::Refunded(refunded))
                    },
                    None => {
                        // A concurrent compensator stamped the refund between our pre-check and
                        // now. The gateway cancel is idempotent per payment reference, so the
                        // second call did not move money.
                        debug!("💸️ Match request #{request_id} was refunded by a concurrent caller");
                        let current = self
                            .db
                            .fetch_match_request(request_id)
                            .await
                            .map_err(|e| CompensationError::DatabaseError(e.to_string()))?
                            .ok_or(CompensationError::RequestNotFound(request_id))?;
                        Ok(CompensationOutcome::AlreadyRefunded(current))
                    },
                }
            },
            Err(e) => {
                let error = e.to_string();
                self.db.record_refund_failure(request_id, &error).await?;
                warn!(
                    "💸️ Gateway cancel of [{payment_ref}] for match request #{request_id} failed and was recorded \
                     for manual reconciliation. {error}"
                );
                Err(CompensationError::GatewayCancelFailed { id: request_id, payment_ref, error })
            },
        }
    }

    /// [`Self::compensate`] under a bounded retry schedule. Only gateway failures are retried;
    /// everything else is final on the first attempt.
    pub async fn compensate_with_retry(
        &self,
        request_id: i64,
        policy: RetryPolicy,
    ) -> Result<CompensationOutcome, CompensationError> {
        let mut attempt = 1;
        loop {
            match self.compensate(request_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e @ CompensationError::GatewayCancelFailed { .. }) if attempt < policy.attempts() => {
                    let wait = policy.backoff_after(attempt);
                    warn!(
                        "💸️ Refund attempt {attempt} of {} for match request #{request_id} failed. Next attempt in \
                         {}ms. {e}",
                        policy.attempts(),
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    //------------------------------------       Internals        -----------------------------------------------------

    /// Evaluates the auto-match rule for one slot: the earliest-placed pending bid meeting the
    /// reserve wins. A slot without a reserve price never auto-matches.
    async fn try_auto_match(&self, slot: &Slot) -> Result<Option<SlotAward>, MatchEngineError> {
        let asking_price = match slot.asking_price {
            Some(price) if slot.auto_match => price,
            _ => return Ok(None),
        };
        let bids = self.db.pending_bids(slot.id).await?;
        let winner = match first_qualifying(asking_price, &bids) {
            Some(winner) => winner.clone(),
            None => return Ok(None),
        };
        match self.db.try_award_slot(slot.id, &winner).await? {
            Some(award) => {
                info!("🔄️ Slot #{} auto-matched to bid #{} ({})", slot.id, award.winner.id, award.winner.amount);
                self.call_slot_matched_hook(&award).await;
                Ok(Some(award))
            },
            None => {
                debug!("🔄️ Slot #{} was resolved by a concurrent caller before the auto-match landed", slot.id);
                Ok(None)
            },
        }
    }

    async fn resolve_due_slot(&self, slot: &Slot, summary: &mut SlotSweepSummary) -> Result<(), MatchEngineError> {
        let bids = self.db.pending_bids(slot.id).await?;
        match deadline_winner(&bids) {
            Some(winner) => {
                let winner = winner.clone();
                match self.db.try_award_slot(slot.id, &winner).await? {
                    Some(award) => {
                        info!(
                            "🔄️ Slot #{} matched to bid #{} ({}) at its deadline",
                            slot.id, award.winner.id, award.winner.amount
                        );
                        self.call_slot_matched_hook(&award).await;
                        summary.matched.push(award);
                    },
                    None => {
                        debug!("🔄️ Slot #{} was resolved before the sweep reached it", slot.id);
                        summary.races_lost += 1;
                    },
                }
            },
            None => match self.db.try_close_slot(slot.id).await? {
                Some(closure) => {
                    info!("🔄️ Slot #{} closed without a winner", slot.id);
                    self.call_slot_closed_hook(&closure).await;
                    summary.closed.push(closure);
                },
                None => {
                    debug!("🔄️ Slot #{} was resolved before the sweep reached it", slot.id);
                    summary.races_lost += 1;
                },
            },
        }
        Ok(())
    }

    async fn expire_and_compensate(
        &self,
        request: &MatchRequest,
        now: DateTime<Utc>,
        summary: &mut RequestSweepSummary,
    ) -> Result<(), MatchEngineError> {
        if !is_response_overdue(request, now) {
            return Ok(());
        }
        let expired = match self.db.try_expire_request(request.id).await? {
            Some(expired) => expired,
            None => {
                debug!("🔄️ Match request #{} was resolved before the sweep reached it", request.id);
                summary.races_lost += 1;
                return Ok(());
            },
        };
        info!("🔄️ Match request #{} expired without a response", expired.id);
        self.call_request_expired_hook(&expired).await;
        let paid = expired.fee_payment_ref.is_some();
        summary.expired.push(expired.clone());
        if paid {
            match self.compensate(expired.id).await {
                Ok(outcome) => summary.refunded.push(outcome.into_request()),
                Err(CompensationError::GatewayCancelFailed { id, error, .. }) => {
                    summary.refund_failures.push((id, error));
                },
                Err(e) => {
                    summary.failures += 1;
                    error!("💸️ Compensation for match request #{} failed: {e}", expired.id);
                },
            }
        }
        Ok(())
    }

    /// Runs the shared refund routine for a freshly rejected or cancelled request. A gateway
    /// failure is already recorded by the time it surfaces here, so the caller gets the request's
    /// truthful current state rather than an error.
    async fn refund_if_paid(&self, request: MatchRequest) -> Result<MatchRequest, MatchFlowError> {
        if request.fee_payment_ref.is_none() {
            return Ok(request);
        }
        match self.compensate(request.id).await {
            Ok(outcome) => Ok(outcome.into_request()),
            Err(CompensationError::GatewayCancelFailed { id, .. }) => {
                let current = self.db.fetch_match_request(id).await?.unwrap_or(request);
                Ok(current)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn request_not_actionable(&self, request_id: i64) -> MatchFlowError {
        match self.db.fetch_match_request(request_id).await {
            Ok(Some(request)) => MatchFlowError::RequestNotActionable { id: request_id, status: request.status },
            Ok(None) => MatchEngineError::RequestNotFound(request_id).into(),
            Err(e) => e.into(),
        }
    }

    async fn call_bid_placed_hook(&self, slot: &Slot, bid: &Bid) {
        for emitter in &self.producers.bid_placed_producer {
            emitter.publish_event(BidPlacedEvent::new(slot.clone(), bid.clone())).await;
        }
    }

    async fn call_outbid_hook(&self, slot: &Slot, outbid: &Bid, new_bid: &Bid) {
        for emitter in &self.producers.outbid_producer {
            emitter.publish_event(OutbidEvent::new(slot.clone(), outbid.clone(), new_bid.clone())).await;
        }
    }

    async fn call_slot_matched_hook(&self, award: &SlotAward) {
        for emitter in &self.producers.slot_matched_producer {
            let event = SlotMatchedEvent::new(award.slot.clone(), award.winner.clone(), award.rejected.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_slot_closed_hook(&self, closure: &SlotClosure) {
        for emitter in &self.producers.slot_closed_producer {
            emitter.publish_event(SlotClosedEvent::new(closure.slot.clone())).await;
        }
    }

    async fn call_request_expired_hook(&self, request: &MatchRequest) {
        for emitter in &self.producers.request_expired_producer {
            emitter.publish_event(RequestExpiredEvent::new(request.clone())).await;
        }
    }

    async fn call_request_refunded_hook(&self, request: &MatchRequest) {
        for emitter in &self.producers.request_refunded_producer {
            emitter.publish_event(RequestRefundedEvent::new(request.clone())).await;
        }
    }
}

fn refund_reason(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Expired => "Introduction request expired without a response",
        RequestStatus::Rejected => "Introduction request declined by the responder",
        RequestStatus::Cancelled => "Introduction request cancelled by the initiator",
        _ => "Introduction fee refund",
    }
}
