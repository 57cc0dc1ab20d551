// SPDX-License-Identifier: MIT

//! Connection pool setup and migration.

use crate::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Open (creating if missing) the SQLite database at `path` and apply all
/// pending migrations.
pub async fn connect(path: &Path) -> Result<SqlitePool, StorageError> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(opts).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// An in-memory pool for tests; migrated the same way as the real thing.
pub async fn connect_in_memory() -> Result<SqlitePool, StorageError> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
