//! Deadline-sweep resolution: single winner, deterministic tie-breaks, race safety.

use chrono::{Duration, Utc};
use log::*;
use slot_match_engine::{
    db_types::{BidStatus, NewBid, NewSlot, SlotStatus},
    events::EventProducers,
    MarketApi,
    MarketQuery,
    MatchEngineDatabase,
    MatchEngineError,
    MatchFlowApi,
    MatchFlowError,
    SlotQueryFilter,
    SqliteDatabase,
};
use sme_common::Krw;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::{
    gateway::RecordingGateway,
    prepare_env::{prepare_test_env, random_db_path},
};

mod support;

type TestApi = MatchFlowApi<SqliteDatabase, RecordingGateway>;

async fn setup() -> TestApi {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 10).await.expect("Error creating database");
    MatchFlowApi::new(db, RecordingGateway::new(), EventProducers::default())
}

async fn tear_down(mut api: TestApi) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

#[tokio::test]
async fn deadline_sweep_awards_highest_bid() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let slot = api
        .db()
        .insert_slot(NewSlot::new(11).with_deadline(t0 + Duration::hours(1)).with_asking_price(Krw::from(1_000_000)))
        .await
        .unwrap();
    api.place_bid(NewBid::new(slot.id, 21, Krw::from(800_000)).placed_at(t0 + Duration::minutes(10))).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 22, Krw::from(1_200_000)).placed_at(t0 + Duration::minutes(20))).await.unwrap();

    let summary = api.sweep_due_slots(t0 + Duration::minutes(65)).await.unwrap();
    assert_eq!(summary.matched.len(), 1);
    assert!(summary.closed.is_empty());
    assert_eq!(summary.failures, 0);

    let slot = api.db().fetch_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Matched);
    assert_eq!(slot.matched_bidder_id, Some(22));
    assert!(slot.matched_at.is_some());

    let bids = api.db().fetch_bids_for_slot(slot.id).await.unwrap();
    let accepted = bids.iter().filter(|b| b.status == BidStatus::Accepted).collect::<Vec<_>>();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].amount, Krw::from(1_200_000));
    assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Rejected).count(), 1);
    tear_down(api).await;
}

#[tokio::test]
async fn amount_ties_go_to_the_earlier_bid() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let slot = api.db().insert_slot(NewSlot::new(1).with_deadline(t0 + Duration::hours(1))).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 31, Krw::from(900_000)).placed_at(t0 + Duration::minutes(30))).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 32, Krw::from(900_000)).placed_at(t0 + Duration::minutes(5))).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 33, Krw::from(900_000)).placed_at(t0 + Duration::minutes(50))).await.unwrap();

    api.sweep_due_slots(t0 + Duration::hours(2)).await.unwrap();
    let slot = api.db().fetch_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Matched);
    assert_eq!(slot.matched_bidder_id, Some(32));
    tear_down(api).await;
}

#[tokio::test]
async fn slot_without_bids_is_closed() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(3);
    let slot = api.db().insert_slot(NewSlot::new(2).with_deadline(t0 + Duration::hours(1))).await.unwrap();

    let summary = api.sweep_due_slots(Utc::now()).await.unwrap();
    assert!(summary.matched.is_empty());
    assert_eq!(summary.closed.len(), 1);

    let slot = api.db().fetch_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Closed);
    assert_eq!(slot.matched_bidder_id, None);
    tear_down(api).await;
}

#[tokio::test]
async fn sweeping_a_resolved_slot_is_a_no_op() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let slot = api.db().insert_slot(NewSlot::new(3).with_deadline(t0 + Duration::hours(1))).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 41, Krw::from(500_000)).placed_at(t0 + Duration::minutes(10))).await.unwrap();

    let first = api.sweep_due_slots(Utc::now()).await.unwrap();
    assert_eq!(first.matched.len(), 1);
    let after_first = api.db().fetch_slot(slot.id).await.unwrap().unwrap();

    let second = api.sweep_due_slots(Utc::now()).await.unwrap();
    assert_eq!(second.resolved_count(), 0);
    assert_eq!(second.races_lost, 0);

    let after_second = api.db().fetch_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(after_second.status, SlotStatus::Matched);
    assert_eq!(after_second.matched_at, after_first.matched_at);
    tear_down(api).await;
}

#[tokio::test]
async fn bids_after_the_deadline_are_turned_away() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let slot = api.db().insert_slot(NewSlot::new(4).with_deadline(t0 + Duration::hours(1))).await.unwrap();

    let err = api
        .place_bid(NewBid::new(slot.id, 51, Krw::from(700_000)).placed_at(t0 + Duration::minutes(70)))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchFlowError::DatabaseError(MatchEngineError::SlotNotBiddable { .. })));

    // The slot stayed clean: no bid row, no count bump.
    let slot = api.db().fetch_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(slot.bid_count, 0);
    assert!(api.db().fetch_bids_for_slot(slot.id).await.unwrap().is_empty());
    tear_down(api).await;
}

#[tokio::test]
async fn bids_against_a_matched_slot_are_turned_away() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let slot = api.db().insert_slot(NewSlot::new(5).with_deadline(t0 + Duration::hours(1))).await.unwrap();
    api.place_bid(NewBid::new(slot.id, 61, Krw::from(400_000)).placed_at(t0 + Duration::minutes(5))).await.unwrap();
    api.sweep_due_slots(Utc::now()).await.unwrap();

    let err = api.place_bid(NewBid::new(slot.id, 62, Krw::from(900_000))).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::DatabaseError(MatchEngineError::SlotNotBiddable { .. })));
    tear_down(api).await;
}

#[tokio::test]
async fn slot_search_filters_by_owner_and_status() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let open = api.db().insert_slot(NewSlot::new(81)).await.unwrap();
    let due = api.db().insert_slot(NewSlot::new(81).with_deadline(t0 + Duration::hours(1))).await.unwrap();
    api.db().insert_slot(NewSlot::new(82).with_auto_match()).await.unwrap();
    api.sweep_due_slots(Utc::now()).await.unwrap();

    let market = MarketApi::new(api.db().clone());
    let owned = market.search_slots(SlotQueryFilter::default().with_owner_id(81)).await.unwrap();
    assert_eq!(owned.iter().map(|s| s.id).collect::<Vec<_>>(), vec![open.id, due.id]);

    let closed = market
        .search_slots(SlotQueryFilter::default().with_owner_id(81).with_status(SlotStatus::Closed))
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, due.id);

    let auto = market.search_slots(SlotQueryFilter::default().with_auto_match(true)).await.unwrap();
    assert_eq!(auto.len(), 1);
    assert_eq!(auto[0].owner_id, 82);
    tear_down(api).await;
}

#[tokio::test]
async fn concurrent_sweeps_award_a_slot_exactly_once() {
    let api = setup().await;
    let t0 = Utc::now() - Duration::hours(2);
    let slot = api.db().insert_slot(NewSlot::new(6).with_deadline(t0 + Duration::hours(1))).await.unwrap();
    for (i, amount) in [600_000, 950_000, 800_000].iter().enumerate() {
        let bid = NewBid::new(slot.id, 70 + i as i64, Krw::from(*amount))
            .placed_at(t0 + Duration::minutes(i as i64 + 1));
        api.place_bid(bid).await.unwrap();
    }

    let now = Utc::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let racer =
            MatchFlowApi::new(api.db().clone(), RecordingGateway::new(), EventProducers::default());
        handles.push(tokio::spawn(async move { racer.sweep_due_slots(now).await.unwrap() }));
    }
    let mut matched = 0;
    for handle in handles {
        let summary = handle.await.unwrap();
        matched += summary.matched.len();
        assert_eq!(summary.failures, 0);
    }
    assert_eq!(matched, 1);

    let slot = api.db().fetch_slot(slot.id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Matched);
    assert_eq!(slot.matched_bidder_id, Some(71));
    let bids = api.db().fetch_bids_for_slot(slot.id).await.unwrap();
    assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Accepted).count(), 1);
    assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Pending).count(), 0);
    tear_down(api).await;
}
