//! The sweep daemon: the operational driver that connects the store, wires up the notification
//! hooks and runs the periodic workers. The real notification senders and gateway client live
//! with the API deployment; this binary logs the events it sees and uses the unconfigured
//! gateway, which queues every refund for manual reconciliation.

use std::{future::Future, pin::Pin};

use dotenvy::dotenv;
use log::*;
use slot_match_engine::{
    config::SweepConfig,
    events::{EventHandlers, EventHooks},
    sqlite::run_migrations,
    sweep_worker::{start_purge_worker, start_request_sweep_worker, start_slot_sweep_worker},
    NullGateway,
    SqliteDatabase,
};

const EVENT_BUFFER_SIZE: usize = 25;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = SweepConfig::from_env_or_default();

    let db = match SqliteDatabase::new_with_url(&config.database_url, 10).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Could not open the market database at {}. {e}", config.database_url);
            return;
        },
    };
    if config.auto_migrate {
        if let Err(e) = run_migrations(db.pool()).await {
            eprintln!("Error running database migrations: {e}");
            return;
        }
        info!("🚀️ Migrations complete");
    }

    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    info!("🚀️ Starting sweep workers against {}", config.database_url);
    let _slot_worker =
        start_slot_sweep_worker(db.clone(), NullGateway, producers.clone(), config.slot_sweep_interval);
    let _request_worker = start_request_sweep_worker(
        db.clone(),
        NullGateway,
        producers.clone(),
        config.request_sweep_interval,
        config.refund_retry,
    );
    let _purge_worker = start_purge_worker(db, NullGateway, producers, config.purge_interval, config.retention);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("🚀️ Error waiting for shutdown signal: {e}");
    }
    println!("Bye!");
}

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Log-only stand-ins for the notification senders.
fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_bid_placed(|ev| {
            Box::pin(async move {
                info!("📣️ Slot #{}: new bid of {} from user {}", ev.slot.id, ev.bid.amount, ev.bid.bidder_id);
            }) as HookFuture
        })
        .on_outbid(|ev| {
            Box::pin(async move {
                info!(
                    "📣️ Slot #{}: user {} has been outbid ({} beats {})",
                    ev.slot.id, ev.outbid.bidder_id, ev.new_bid.amount, ev.outbid.amount
                );
            }) as HookFuture
        })
        .on_slot_matched(|ev| {
            Box::pin(async move {
                info!(
                    "📣️ Slot #{} matched to user {} at {}. {} other bidders lost.",
                    ev.slot.id,
                    ev.winner.bidder_id,
                    ev.winner.amount,
                    ev.rejected.len()
                );
            }) as HookFuture
        })
        .on_slot_closed(|ev| {
            Box::pin(async move {
                info!("📣️ Slot #{} closed without a winner", ev.slot.id);
            }) as HookFuture
        })
        .on_request_expired(|ev| {
            Box::pin(async move {
                info!(
                    "📣️ Match request #{} between users {} and {} expired",
                    ev.request.id, ev.request.initiator_id, ev.request.responder_id
                );
            }) as HookFuture
        })
        .on_request_refunded(|ev| {
            Box::pin(async move {
                info!("📣️ Match request #{}: fee of {} refunded", ev.request.id, ev.request.fee_amount);
            }) as HookFuture
        });
    hooks
}
