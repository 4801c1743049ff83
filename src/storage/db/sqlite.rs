//! SQLite backend implementation using sqlx.
//!
//! Provides connection pooling for SQLite.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool as SqlxPool, SqlitePoolOptions,
    SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::storage::StorageError;

/// Default maximum connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite connection pool wrapper.
///
/// Wraps sqlx's SqlitePool with WAL mode and connection pooling defaults.
#[derive(Clone)]
pub struct SqlitePool {
    inner: SqlxPool,
}

impl std::fmt::Debug for SqlitePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePool").finish_non_exhaustive()
    }
}

impl SqlitePool {
    /// Connect to a SQLite database with the default pool size.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL, e.g., `sqlite:data/homewatch.db?mode=rwc`
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        Self::connect_with_size(url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit pool size.
    ///
    /// # Configuration
    ///
    /// - WAL journal mode for better concurrency
    /// - Normal synchronous mode for performance with durability
    /// - Create database if not exists
    /// - In-memory databases are pinned to one long-lived connection, since
    ///   every SQLite connection to `:memory:` opens a separate database
    pub async fn connect_with_size(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(DEFAULT_CONNECT_TIMEOUT);
        pool_options = if url.contains(":memory:") {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { inner: pool })
    }

    /// Get the underlying sqlx pool for direct query execution.
    #[inline]
    pub fn inner(&self) -> &SqlxPool {
        &self.inner
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.inner.close().await;
    }

    /// Check if the pool is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
