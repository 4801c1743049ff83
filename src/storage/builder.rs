//! Storage builder.
//!
//! Opens the SQLite pool, prepares the database directory and initializes
//! the schema before handing out a [`SqliteStore`].

use std::path::{Path, PathBuf};

use crate::storage::db::SqlitePool;
use crate::storage::{SqliteStore, StorageError, schema};

/// Minimum connection pool size.
const MIN_POOL_SIZE: u32 = 2;

/// Maximum connection pool size.
const MAX_POOL_SIZE: u32 = 32;

/// Calculate default pool size based on available CPU parallelism.
///
/// Returns the number of available CPUs, clamped between MIN_POOL_SIZE and MAX_POOL_SIZE.
fn default_pool_size() -> u32 {
    std::thread::available_parallelism()
        .map(|p| (p.get() as u32).clamp(MIN_POOL_SIZE, MAX_POOL_SIZE))
        .unwrap_or(4)
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Builder for constructing the storage layer.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    location: Location,
    pool_size: u32,
}

impl StorageBuilder {
    /// Create a builder for an on-disk database.
    ///
    /// Pool size defaults to the number of available CPUs (clamped to 2-32).
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            location: Location::File(db_path.as_ref().to_path_buf()),
            pool_size: default_pool_size(),
        }
    }

    /// Create a builder for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool_size: 1,
        }
    }

    /// Set the connection pool size. Ignored for in-memory databases.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.clamp(1, MAX_POOL_SIZE);
        self
    }

    /// Open the pool and initialize the schema.
    pub async fn build(self) -> Result<SqliteStore, StorageError> {
        let url = match &self.location {
            Location::Memory => "sqlite::memory:".to_string(),
            Location::File(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                format!("sqlite:{}?mode=rwc", path.display())
            }
        };

        let pool = SqlitePool::connect_with_size(&url, self.pool_size).await?;
        schema::init_schema(&pool).await?;

        tracing::info!(url = %url, pool_size = self.pool_size, "Storage initialized");
        Ok(SqliteStore::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EventStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_builder_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("homewatch.db");

        let store = StorageBuilder::new(&db_path).pool_size(2).build().await.unwrap();
        assert!(db_path.exists());

        store.append(1, 21.0, 45.0, Utc::now()).await.unwrap();
        assert_eq!(store.count_readings().await.unwrap(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("homewatch.db");

        let store = StorageBuilder::new(&db_path).build().await.unwrap();
        store.append(1, 21.0, 45.0, Utc::now()).await.unwrap();
        store.close().await;

        let store = StorageBuilder::new(&db_path).build().await.unwrap();
        assert_eq!(store.count_readings().await.unwrap(), 1);
        store.close().await;
    }

    #[test]
    fn test_default_pool_size_in_range() {
        let size = default_pool_size();
        assert!((MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&size));
    }
}
