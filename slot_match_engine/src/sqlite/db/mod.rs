//! # SQLite database methods
//!
//! "Low-level" SQLite interactions for the matching engine.
//!
//! Everything here is a plain function taking a `&mut SqliteConnection`. Callers obtain a
//! connection from the pool, or open a transaction and pass `&mut *tx`, so any of these calls can
//! be composed into a single atomic unit as the need arises.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod bids;
pub mod match_requests;
pub mod slots;

const SQLITE_DB_URL: &str = "sqlite://data/slot_market.db";

pub fn db_url() -> String {
    let result = env::var("SME_DATABASE_URL").unwrap_or_else(|_| {
        info!("SME_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    // WAL + a busy timeout keep the concurrent resolution paths from tripping over transient
    // write locks.
    let options = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
