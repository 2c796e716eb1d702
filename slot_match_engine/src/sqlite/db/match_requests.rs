use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{MatchRequest, NewMatchRequest, RequestStatus},
    traits::MatchEngineError,
};

pub async fn insert_request(
    request: NewMatchRequest,
    status: RequestStatus,
    response_deadline: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<MatchRequest, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            INSERT INTO match_requests
                (initiator_id, responder_id, fee_payment_ref, fee_amount, status, response_deadline, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(request.initiator_id)
    .bind(request.responder_id)
    .bind(request.fee_payment_ref)
    .bind(request.fee_amount)
    .bind(status)
    .bind(response_deadline)
    .bind(request.created_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Match request #{} stored", request.id);
    Ok(request)
}

pub async fn fetch_request(
    request_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, sqlx::Error> {
    let request =
        sqlx::query_as("SELECT * FROM match_requests WHERE id = $1").bind(request_id).fetch_optional(conn).await?;
    Ok(request)
}

/// An unresolved request between the two users, in either direction, if one exists.
pub async fn fetch_active_request_between(
    user_a: i64,
    user_b: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, sqlx::Error> {
    let request = sqlx::query_as(
        r#"
            SELECT * FROM match_requests
            WHERE ((initiator_id = $1 AND responder_id = $2) OR (initiator_id = $2 AND responder_id = $1))
              AND status IN ('PendingPayment', 'Pending', 'Accepted', 'ContactMade')
            LIMIT 1
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn fetch_due_requests(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<MatchRequest>, sqlx::Error> {
    let requests = sqlx::query_as(
        r#"
            SELECT * FROM match_requests
            WHERE status = 'Pending' AND response_deadline IS NOT NULL
              AND unixepoch(response_deadline) <= unixepoch($1)
            ORDER BY response_deadline ASC
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(requests)
}

/// Confirms the introduction fee payment: the request leaves `PendingPayment`, the payment
/// reference is stored, and the response clock starts. The deadline set here is never touched
/// again.
pub async fn try_confirm_payment(
    request_id: i64,
    payment_ref: &str,
    response_deadline: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests
            SET status = 'Pending', fee_payment_ref = $1, response_deadline = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'PendingPayment'
            RETURNING *;
        "#,
    )
    .bind(payment_ref)
    .bind(response_deadline)
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn try_expire(request_id: i64, conn: &mut SqliteConnection) -> Result<Option<MatchRequest>, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests SET status = 'Expired', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn try_respond(
    request_id: i64,
    accepted: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, MatchEngineError> {
    let new_status = if accepted { RequestStatus::Accepted } else { RequestStatus::Rejected };
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests SET status = $1, responded_at = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(now)
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn try_cancel(request_id: i64, conn: &mut SqliteConnection) -> Result<Option<MatchRequest>, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status IN ('PendingPayment', 'Pending')
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn try_mark_contact_made(
    request_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests SET status = 'ContactMade', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Accepted'
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn try_complete(
    request_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests SET status = 'Completed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status IN ('Accepted', 'ContactMade')
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

/// Stamps a successful refund. Conditional on the request being refundable with no refund yet on
/// record, so a second compensation attempt falls through to `None` instead of double-stamping.
pub async fn try_mark_refunded(
    request_id: i64,
    refund_ref: &str,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchRequest>, MatchEngineError> {
    let request = sqlx::query_as(
        r#"
            UPDATE match_requests
            SET status = 'Refunded', refund_ref = $1, refund_reason = $2, refunded_at = CURRENT_TIMESTAMP,
                refund_failure = NULL, refund_failed_at = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status IN ('Rejected', 'Expired', 'Cancelled') AND refund_ref IS NULL
            RETURNING *;
        "#,
    )
    .bind(refund_ref)
    .bind(reason)
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

/// Records a failed gateway cancel against the request without touching its status.
pub async fn record_refund_failure(
    request_id: i64,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<MatchRequest, MatchEngineError> {
    let request: Option<MatchRequest> = sqlx::query_as(
        r#"
            UPDATE match_requests
            SET refund_failure = $1, refund_failed_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    request.ok_or(MatchEngineError::RequestNotFound(request_id))
}

/// Paid, refundable requests with no refund on record — the manual reconciliation queue.
pub async fn fetch_pending_refunds(conn: &mut SqliteConnection) -> Result<Vec<MatchRequest>, sqlx::Error> {
    let requests = sqlx::query_as(
        r#"
            SELECT * FROM match_requests
            WHERE status IN ('Rejected', 'Expired', 'Cancelled')
              AND fee_payment_ref IS NOT NULL AND refund_ref IS NULL
            ORDER BY updated_at ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(requests)
}

/// Deletes settled requests whose last update is older than `retention_secs`. A request that is
/// still owed a refund is never purged, whatever its age.
pub async fn purge_settled_requests(
    now: DateTime<Utc>,
    retention_secs: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, MatchEngineError> {
    let result = sqlx::query(
        format!(
            r#"
            DELETE FROM match_requests
            WHERE status IN ('Rejected', 'Expired', 'Refunded', 'Completed', 'Cancelled')
              AND NOT (fee_payment_ref IS NOT NULL AND refund_ref IS NULL AND status != 'Completed')
              AND unixepoch($1) - unixepoch(updated_at) > {retention_secs}
            "#
        )
        .as_str(),
    )
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
