//! SQLite backend for the matching engine.
mod sqlite_impl;

pub mod db;

pub use sqlite_impl::SqliteDatabase;

/// Applies the bundled migrations to the database behind the pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await
}
