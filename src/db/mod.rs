//! Database connection pool, migrations, and health check.
//!
//! The shared store is a single SQLite file opened in WAL mode. Every process
//! that touches a queue opens its own `Db` on the same file; nothing else is
//! shared between them.

pub mod lock;
pub mod queue;
pub mod trace_log;

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// How long a statement waits on SQLite's own file lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database handle. Owns the connection pool shared across all modules.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the SQLite store at `url` and build a pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Interpret a stored 0/1 flag. Anything else is corruption.
pub(crate) fn decode_flag(raw: i64, what: &str) -> Result<bool> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::Corrupt(format!("{what}: invalid flag value {other}"))),
    }
}

/// Decode a stored JSON item list. NULL and empty text mean "no items".
pub(crate) fn decode_items(raw: Option<&str>, what: &str) -> Result<Vec<serde_json::Value>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| Error::Corrupt(format!("{what}: unreadable item list: {e}"))),
    }
}

pub(crate) fn encode_items(items: &[serde_json::Value]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| Error::Other(format!("failed to encode items: {e}")))
}
