//! Database abstraction layer.
//!
//! - `SqlitePool`: Connection pool wrapper for SQLite
//!
//! # Example
//!
//! ```ignore
//! let pool = SqlitePool::connect("sqlite:data/homewatch.db?mode=rwc").await?;
//! let row = sqlx::query("SELECT 1").fetch_one(pool.inner()).await?;
//! ```

mod sqlite;

pub use sqlite::SqlitePool;
