//! SQLite database connection management.
//!
//! Provides a connection pool to the SQLite database with WAL mode
//! enabled, so `axh serve` can answer searches while a `load` run writes.
//! The database file and its parent directories are created automatically.
//!
//! Every command acquires one pool for its whole run and closes it on
//! every exit path; see [`with_pool`].

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured SQLite database.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode for concurrent read/write.
/// - Returns a pool with up to 5 connections.
///
/// # Errors
///
/// Returns an error if the database cannot be created or connected to.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run `f` with a fresh pool, closing the pool afterwards whether `f`
/// succeeded or not.
pub async fn with_pool<T, F, Fut>(config: &Config, f: F) -> Result<T>
where
    F: FnOnce(SqlitePool) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let pool = connect(config).await?;
    let result = f(pool.clone()).await;
    pool.close().await;
    result
}
