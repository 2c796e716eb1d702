use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Bid, NewBid},
    traits::MatchEngineError,
};

pub async fn insert_bid(bid: NewBid, conn: &mut SqliteConnection) -> Result<Bid, MatchEngineError> {
    let bid = sqlx::query_as(
        r#"
            INSERT INTO bids (slot_id, bidder_id, amount, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(bid.slot_id)
    .bind(bid.bidder_id)
    .bind(bid.amount)
    .bind(bid.created_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Bid #{} of {} placed against slot #{}", bid.id, bid.amount, bid.slot_id);
    Ok(bid)
}

pub async fn fetch_bid(bid_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as("SELECT * FROM bids WHERE id = $1").bind(bid_id).fetch_optional(conn).await?;
    Ok(bid)
}

pub async fn fetch_bids_for_slot(slot_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let bids = sqlx::query_as("SELECT * FROM bids WHERE slot_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(slot_id)
        .fetch_all(conn)
        .await?;
    Ok(bids)
}

pub async fn fetch_pending_bids(slot_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let bids = sqlx::query_as(
        "SELECT * FROM bids WHERE slot_id = $1 AND status = 'Pending' ORDER BY created_at ASC, id ASC",
    )
    .bind(slot_id)
    .fetch_all(conn)
    .await?;
    Ok(bids)
}

/// The best pending bid: highest amount, earliest placed (then lowest id) among equals.
pub async fn fetch_highest_pending_bid(
    slot_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as(
        r#"
            SELECT * FROM bids WHERE slot_id = $1 AND status = 'Pending'
            ORDER BY amount DESC, created_at ASC, id ASC LIMIT 1
        "#,
    )
    .bind(slot_id)
    .fetch_optional(conn)
    .await?;
    Ok(bid)
}

/// Accepts the winning bid, conditional on it still being `Pending`.
pub async fn try_accept_bid(bid_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, MatchEngineError> {
    let bid = sqlx::query_as(
        r#"
            UPDATE bids SET status = 'Accepted', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(bid_id)
    .fetch_optional(conn)
    .await?;
    Ok(bid)
}

/// Rejects every pending bid under the slot except the winner. Returns the rejected rows.
pub async fn reject_other_pending_bids(
    slot_id: i64,
    winner_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Bid>, MatchEngineError> {
    let bids = sqlx::query_as(
        r#"
            UPDATE bids SET status = 'Rejected', updated_at = CURRENT_TIMESTAMP
            WHERE slot_id = $1 AND status = 'Pending' AND id != $2
            RETURNING *;
        "#,
    )
    .bind(slot_id)
    .bind(winner_id)
    .fetch_all(conn)
    .await?;
    Ok(bids)
}

/// Rejects every pending bid under the slot. Used when a slot closes without a winner.
pub async fn reject_all_pending_bids(slot_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Bid>, MatchEngineError> {
    let bids = sqlx::query_as(
        r#"
            UPDATE bids SET status = 'Rejected', updated_at = CURRENT_TIMESTAMP
            WHERE slot_id = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(slot_id)
    .fetch_all(conn)
    .await?;
    Ok(bids)
}

/// Deletes resolved bids whose last update is older than `retention_secs`.
pub async fn purge_settled_bids(
    now: DateTime<Utc>,
    retention_secs: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, MatchEngineError> {
    let result = sqlx::query(
        format!(
            "DELETE FROM bids WHERE status != 'Pending' AND unixepoch($1) - unixepoch(updated_at) > {retention_secs}"
        )
        .as_str(),
    )
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
