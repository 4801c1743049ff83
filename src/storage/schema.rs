//! Database schema definitions.

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;

/// Continuous climate readings. `ts` is integer microseconds since the epoch.
pub const READINGS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS readings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sensor_id   INTEGER NOT NULL,
    temperature REAL NOT NULL,
    humidity    REAL NOT NULL,
    ts          INTEGER NOT NULL
);
"#;

/// Range scans by the retention sweep go through this index.
pub const READINGS_TS_INDEX_DDL: &str =
    "CREATE INDEX IF NOT EXISTS idx_readings_ts ON readings (ts);";

/// Completed button presses.
pub const BUTTON_READINGS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS button_readings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    button_id   INTEGER NOT NULL,
    started_at  INTEGER NOT NULL,
    ended_at    INTEGER NOT NULL
);
"#;

pub const BUTTON_READINGS_INDEX_DDL: &str =
    "CREATE INDEX IF NOT EXISTS idx_button_readings_started ON button_readings (started_at);";

/// Outdoor weather observations.
pub const WEATHER_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS weather_data (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ts          INTEGER NOT NULL,
    name        TEXT NOT NULL,
    lat         REAL NOT NULL,
    lon         REAL NOT NULL,
    temperature REAL NOT NULL,
    humidity    REAL NOT NULL,
    feels_like  REAL NOT NULL
);
"#;

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    for ddl in [
        READINGS_TABLE_DDL,
        READINGS_TS_INDEX_DDL,
        BUTTON_READINGS_TABLE_DDL,
        BUTTON_READINGS_INDEX_DDL,
        WEATHER_TABLE_DDL,
    ] {
        sqlx::query(ddl).execute(pool.inner()).await?;
    }

    tracing::info!("Database schema initialized");
    Ok(())
}
