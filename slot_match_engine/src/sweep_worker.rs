//! The periodic workers that drive resolution.
//!
//! Each worker owns its own `MatchFlowApi` built from clones of the shared database handle,
//! gateway and event producers, and runs forever on a fixed interval. A failed pass is logged and
//! the worker waits for the next tick; per-entity failures inside a pass are already isolated by
//! the sweep bodies themselves.

use chrono::{Duration, Utc};
use log::*;
use tokio::task::JoinHandle;

use crate::{events::EventProducers, traits::PaymentGateway, MatchFlowApi, RetryPolicy, SqliteDatabase};

/// Starts the slot sweep worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// Each pass first evaluates the auto-match slots, then resolves every slot whose bidding
/// deadline has lapsed.
pub fn start_slot_sweep_worker<G>(
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
    interval: std::time::Duration,
) -> JoinHandle<()>
where
    G: PaymentGateway + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = MatchFlowApi::new(db, gateway, producers);
        info!("🕰️ Slot sweep worker started (every {}s)", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running slot sweep");
            match api.sweep_auto_match_slots().await {
                Ok(summary) if !summary.matched.is_empty() => {
                    info!("🕰️ {} slots auto-matched", summary.matched.len());
                },
                Ok(_) => {},
                Err(e) => error!("🕰️ Error running the auto-match sweep: {e}"),
            }
            match api.sweep_due_slots(Utc::now()).await {
                Ok(summary) => {
                    if summary.resolved_count() > 0 {
                        info!(
                            "🕰️ Slot sweep complete. {} matched, {} closed, {} lost races, {} failures",
                            summary.matched.len(),
                            summary.closed.len(),
                            summary.races_lost,
                            summary.failures
                        );
                        debug!("🕰️ Slot sweep detail: {}", serde_json::to_string(&summary).unwrap_or_default());
                    }
                },
                Err(e) => error!("🕰️ Error running the slot deadline sweep: {e}"),
            }
        }
    })
}

/// Starts the match request expiry worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// Requests that lapse are expired and, when paid, refunded in the same pass. Gateway failures
/// within a pass are retried on the configured schedule before landing in the reconciliation
/// queue.
pub fn start_request_sweep_worker<G>(
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
    interval: std::time::Duration,
    refund_retry: RetryPolicy,
) -> JoinHandle<()>
where
    G: PaymentGateway + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = MatchFlowApi::new(db, gateway, producers);
        info!("🕰️ Match request expiry worker started (every {}s)", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running match request expiry sweep");
            match api.sweep_due_requests(Utc::now()).await {
                Ok(summary) => {
                    if summary.expired_count() > 0 {
                        info!(
                            "🕰️ Request sweep complete. {} expired, {} refunded, {} refunds pending reconciliation",
                            summary.expired_count(),
                            summary.refunded_count(),
                            summary.refund_failures.len()
                        );
                        debug!("🕰️ Request sweep detail: {}", serde_json::to_string(&summary).unwrap_or_default());
                    }
                    for (request_id, _) in &summary.refund_failures {
                        match api.compensate_with_retry(*request_id, refund_retry).await {
                            Ok(_) => info!("🕰️ Refund for match request #{request_id} went through on retry"),
                            Err(e) => {
                                warn!("🕰️ Refund for match request #{request_id} is left for reconciliation. {e}")
                            },
                        }
                    }
                },
                Err(e) => error!("🕰️ Error running the match request expiry sweep: {e}"),
            }
        }
    })
}

/// Starts the retention purge worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_purge_worker<G>(
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
    interval: std::time::Duration,
    retention: Duration,
) -> JoinHandle<()>
where
    G: PaymentGateway + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = MatchFlowApi::new(db, gateway, producers);
        info!("🕰️ Retention purge worker started (every {}s, retention {} days)", interval.as_secs(), retention.num_days());
        loop {
            timer.tick().await;
            debug!("🕰️ Running retention purge");
            match api.purge_settled(Utc::now(), retention).await {
                Ok(totals) => {
                    if totals.total() > 0 {
                        info!("🕰️ Purge removed {} bids and {} match requests", totals.bids, totals.requests);
                    }
                },
                Err(e) => error!("🕰️ Error running the retention purge: {e}"),
            }
        }
    })
}
