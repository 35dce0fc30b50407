//! Coordination store handle.
//!
//! One SQLite file per deployment, opened in WAL mode so concurrent hook
//! invocations keep reading while one writes. A single wait budget from the
//! configuration bounds both the write-lock wait and the pool acquire: a
//! wedged store degrades the hook to `{}` instead of hanging it.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("unusable database DSN '{0}'")]
    BadDsn(String),

    #[error("could not prepare the database directory: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("pool initialization failed: {0}")]
    Pool(#[from] sqlx::Error),
}

/// Open the store the configuration describes.
pub async fn open(config: &DatabaseConfig) -> Result<SqlitePool, OpenError> {
    let budget = Duration::from_secs(config.acquire_timeout_secs);
    prepare_parent_dir(&config.url)?;

    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|_| OpenError::BadDsn(config.url.clone()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(budget);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(budget)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// In-memory store for tests. A single connection keeps the database alive
/// and serializes access, which also exercises the acquire path.
pub async fn open_in_memory() -> Result<SqlitePool, OpenError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|_| OpenError::BadDsn("sqlite::memory:".to_string()))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// SQLite will not create missing directories on its own, and hooks are
/// often the first thing to run in a fresh checkout.
fn prepare_parent_dir(dsn: &str) -> Result<(), OpenError> {
    let path = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn);
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }

    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
