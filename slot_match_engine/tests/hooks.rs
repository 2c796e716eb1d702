//! Event hooks fire on resolution outcomes without ever being able to fail them.

use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI32, Arc},
};

use chrono::{Duration, Utc};
use log::*;
use slot_match_engine::{
    db_types::{NewBid, NewMatchRequest, NewSlot},
    events::{EventHandlers, EventHooks},
    MatchEngineDatabase,
    MatchFlowApi,
    SqliteDatabase,
};
use sme_common::Krw;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::{
    gateway::RecordingGateway,
    prepare_env::{prepare_test_env, random_db_path},
};

mod support;

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(std::sync::atomic::Ordering::Relaxed)
    }
}

async fn wait_for(expected: i32, counter: &HookCalled) {
    let mut spins = 0;
    while counter.count() != expected && spins < 200 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        spins += 1;
    }
}

#[tokio::test]
async fn bid_and_match_hooks_fire() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 10).await.expect("Error creating database");

    let placed = HookCalled::default();
    let outbid = HookCalled::default();
    let matched = HookCalled::default();
    let mut hooks = EventHooks::default();
    let counter = placed.clone();
    hooks.on_bid_placed(move |ev| {
        info!("🪝️ bid placed: {:?}", ev.bid.id);
        counter.called();
        Box::pin(async {}) as HookFuture
    });
    let counter = outbid.clone();
    hooks.on_outbid(move |ev| {
        info!("🪝️ user {} outbid on slot #{}", ev.outbid.bidder_id, ev.slot.id);
        counter.called();
        Box::pin(async {}) as HookFuture
    });
    let counter = matched.clone();
    hooks.on_slot_matched(move |ev| {
        info!("🪝️ slot #{} matched", ev.slot.id);
        counter.called();
        Box::pin(async {}) as HookFuture
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = MatchFlowApi::new(db.clone(), RecordingGateway::new(), producers);
    let slot = db.insert_slot(NewSlot::new(1).with_asking_price(Krw::from(1_000_000)).with_auto_match()).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 11, Krw::from(500_000))).await.unwrap();
    // Higher than the standing best and over the reserve: outbid + match in one placement.
    api.place_bid(NewBid::new(slot.id, 12, Krw::from(1_100_000))).await.unwrap();

    wait_for(2, &placed).await;
    wait_for(1, &outbid).await;
    wait_for(1, &matched).await;
    assert_eq!(placed.count(), 2);
    assert_eq!(outbid.count(), 1);
    assert_eq!(matched.count(), 1);

    Sqlite::drop_database(&url).await.unwrap();
}

#[tokio::test]
async fn expiry_and_refund_hooks_fire() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 10).await.expect("Error creating database");

    let expired = HookCalled::default();
    let refunded = HookCalled::default();
    let mut hooks = EventHooks::default();
    let counter = expired.clone();
    hooks.on_request_expired(move |ev| {
        info!("🪝️ request #{} expired", ev.request.id);
        counter.called();
        Box::pin(async {}) as HookFuture
    });
    let counter = refunded.clone();
    hooks.on_request_refunded(move |ev| {
        info!("🪝️ request #{} refunded", ev.request.id);
        counter.called();
        Box::pin(async {}) as HookFuture
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = MatchFlowApi::new(db, RecordingGateway::new(), producers);
    let t0 = Utc::now() - Duration::days(3);
    let request = NewMatchRequest::new(1, 2, Krw::from_man(3)).with_payment_ref("pay-1").requested_at(t0);
    api.place_match_request(request, Duration::hours(48)).await.unwrap();
    api.sweep_due_requests(Utc::now()).await.unwrap();

    wait_for(1, &expired).await;
    wait_for(1, &refunded).await;
    assert_eq!(expired.count(), 1);
    assert_eq!(refunded.count(), 1);

    Sqlite::drop_database(&url).await.unwrap();
}
