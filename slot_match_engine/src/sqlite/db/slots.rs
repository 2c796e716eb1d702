use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewSlot, Slot},
    traits::{MatchEngineError, SlotQueryFilter},
};

pub async fn insert_slot(slot: NewSlot, conn: &mut SqliteConnection) -> Result<Slot, MatchEngineError> {
    let slot = sqlx::query_as(
        r#"
            INSERT INTO slots (owner_id, bid_deadline, asking_price, auto_match, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(slot.owner_id)
    .bind(slot.bid_deadline)
    .bind(slot.asking_price)
    .bind(slot.auto_match)
    .bind(slot.created_at)
    .fetch_one(conn)
    .await?;
    Ok(slot)
}

pub async fn fetch_slot(slot_id: i64, conn: &mut SqliteConnection) -> Result<Option<Slot>, sqlx::Error> {
    let slot = sqlx::query_as("SELECT * FROM slots WHERE id = $1").bind(slot_id).fetch_optional(conn).await?;
    Ok(slot)
}

/// `Bidding` slots whose deadline has passed at `now`.
///
/// `unixepoch` normalises the stored RFC3339 timestamps and `CURRENT_TIMESTAMP`-style strings
/// into one comparable representation.
pub async fn fetch_due_slots(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Slot>, sqlx::Error> {
    let slots = sqlx::query_as(
        r#"
            SELECT * FROM slots
            WHERE status = 'Bidding' AND bid_deadline IS NOT NULL AND unixepoch(bid_deadline) <= unixepoch($1)
            ORDER BY bid_deadline ASC
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(slots)
}

/// Auto-match slots worth evaluating: still bidding, and with at least one bid on record.
pub async fn fetch_auto_match_slots(conn: &mut SqliteConnection) -> Result<Vec<Slot>, sqlx::Error> {
    let slots = sqlx::query_as(
        "SELECT * FROM slots WHERE status = 'Bidding' AND auto_match = 1 AND bid_count > 0 ORDER BY created_at ASC",
    )
    .fetch_all(conn)
    .await?;
    Ok(slots)
}

/// The conditional award transition. Returns `None` if the slot already left `Bidding`.
pub async fn try_transition_to_matched(
    slot_id: i64,
    bidder_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Slot>, MatchEngineError> {
    let slot = sqlx::query_as(
        r#"
            UPDATE slots
            SET status = 'Matched', matched_bidder_id = $1, matched_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status = 'Bidding'
            RETURNING *;
        "#,
    )
    .bind(bidder_id)
    .bind(slot_id)
    .fetch_optional(conn)
    .await?;
    Ok(slot)
}

/// The conditional close transition. Returns `None` if the slot already left `Bidding`.
pub async fn try_transition_to_closed(
    slot_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Slot>, MatchEngineError> {
    let slot = sqlx::query_as(
        r#"
            UPDATE slots SET status = 'Closed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Bidding'
            RETURNING *;
        "#,
    )
    .bind(slot_id)
    .fetch_optional(conn)
    .await?;
    Ok(slot)
}

pub async fn increment_bid_count(slot_id: i64, conn: &mut SqliteConnection) -> Result<(), MatchEngineError> {
    sqlx::query("UPDATE slots SET bid_count = bid_count + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(slot_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fetches slots according to criteria specified in the `SlotQueryFilter`.
///
/// Resulting slots are ordered by `created_at` in ascending order.
pub async fn search_slots(filter: SlotQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Slot>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM slots ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(owner_id) = filter.owner_id {
        where_clause.push("owner_id = ");
        where_clause.push_bind_unseparated(owner_id);
    }
    if filter.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            filter.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(auto_match) = filter.auto_match {
        where_clause.push("auto_match = ");
        where_clause.push_bind_unseparated(auto_match);
    }
    if let Some(since) = filter.since {
        where_clause.push("unixepoch(created_at) >= ");
        where_clause.push_bind_unseparated(since.timestamp());
    }
    if let Some(until) = filter.until {
        where_clause.push("unixepoch(created_at) <= ");
        where_clause.push_bind_unseparated(until.timestamp());
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let slots = builder.build_query_as::<Slot>().fetch_all(conn).await?;
    Ok(slots)
}
