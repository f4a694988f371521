//! Queue rows: item list storage and the queue lock flag.
//!
//! Lock transitions are single conditional UPDATEs. The affected-row count is
//! the only thing that decides who got the lock.

use crate::db::{decode_flag, decode_items, encode_items};
use crate::error::{Error, Result};
use crate::model::{LockId, QueueId, QueueRecord};

impl super::Db {
    /// Provision a new queue, optionally bound to a task lock.
    pub async fn create_queue(&self, lock_id: Option<LockId>, description: &str) -> Result<QueueId> {
        let id = sqlx::query(
            "INSERT INTO taskqueue (lockid, items, qlocked, \"desc\", update_time)
             VALUES (?, '[]', 0, ?, ?)",
        )
        .bind(lock_id.map(|l| l.0))
        .bind(description)
        .bind(chrono::Utc::now())
        .execute(self.pool())
        .await?
        .last_insert_rowid();
        Ok(QueueId(id))
    }

    /// Get a queue record by ID.
    pub async fn queue_record(&self, id: QueueId) -> Result<QueueRecord> {
        let row: Option<QueueRow> = sqlx::query_as(
            "SELECT taskid, lockid, items, qlocked, \"desc\" AS description, update_time
             FROM taskqueue WHERE taskid = ?",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("{id}")))?
            .try_into_record()
    }

    /// Read the current item list without touching the queue lock.
    pub async fn queue_items(&self, id: QueueId) -> Result<Vec<serde_json::Value>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT items FROM taskqueue WHERE taskid = ?")
                .bind(id.0)
                .fetch_optional(self.pool())
                .await?;
        let (raw,) = row.ok_or_else(|| Error::NotFound(format!("{id}")))?;
        decode_items(raw.as_deref(), &id.to_string())
    }

    /// Overwrite the item list. Callers must hold the queue lock.
    pub async fn store_queue_items(&self, id: QueueId, items: &[serde_json::Value]) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE taskqueue SET items = ?, update_time = ? WHERE taskid = ?",
        )
        .bind(encode_items(items)?)
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("{id}")));
        }
        Ok(())
    }

    /// Compare-and-set the queue lock flag 0 -> 1.
    ///
    /// Returns `false` when the flag is already set.
    pub async fn try_lock_queue(&self, id: QueueId) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE taskqueue SET qlocked = 1, update_time = ? WHERE taskid = ? AND qlocked = 0",
        )
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(true);
        }
        self.queue_locked(id).await?;
        Ok(false)
    }

    /// Compare-and-set the queue lock flag 1 -> 0.
    ///
    /// Returns `false` when the flag was not set.
    pub async fn unlock_queue(&self, id: QueueId) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE taskqueue SET qlocked = 0, update_time = ? WHERE taskid = ? AND qlocked = 1",
        )
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(true);
        }
        self.queue_locked(id).await?;
        Ok(false)
    }

    /// Clear the queue lock regardless of who set it.
    ///
    /// Operator recovery for a process that died while holding the lock.
    pub async fn force_unlock_queue(&self, id: QueueId) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE taskqueue SET qlocked = 0, update_time = ? WHERE taskid = ?",
        )
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("{id}")));
        }
        tracing::warn!(queue = %id, "queue lock force-cleared");
        Ok(())
    }

    /// Current value of the queue lock flag.
    pub async fn queue_locked(&self, id: QueueId) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT qlocked FROM taskqueue WHERE taskid = ?")
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;
        let (raw,) = row.ok_or_else(|| Error::NotFound(format!("{id}")))?;
        decode_flag(raw, &id.to_string())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct QueueRow {
    taskid: i64,
    lockid: Option<i64>,
    items: Option<String>,
    qlocked: i64,
    description: String,
    update_time: chrono::DateTime<chrono::Utc>,
}

impl QueueRow {
    fn try_into_record(self) -> Result<QueueRecord> {
        let id = QueueId(self.taskid);
        let what = id.to_string();
        Ok(QueueRecord {
            id,
            lock_id: self.lockid.map(LockId),
            items: decode_items(self.items.as_deref(), &what)?,
            queue_locked: decode_flag(self.qlocked, &what)?,
            description: self.description,
            updated_at: self.update_time,
        })
    }
}
