//! Task lock rows.

use crate::db::decode_flag;
use crate::error::{Error, Result};
use crate::model::{LockId, TaskLockRecord};

impl super::Db {
    /// Provision a new, unlocked task lock.
    pub async fn create_task_lock(&self, description: &str) -> Result<LockId> {
        let id = sqlx::query(
            "INSERT INTO tasklock (locked, \"desc\", update_time) VALUES (0, ?, ?)",
        )
        .bind(description)
        .bind(chrono::Utc::now())
        .execute(self.pool())
        .await?
        .last_insert_rowid();
        Ok(LockId(id))
    }

    /// Get a task lock record by ID.
    pub async fn task_lock_record(&self, id: LockId) -> Result<TaskLockRecord> {
        let row: Option<TaskLockRow> = sqlx::query_as(
            "SELECT lockid, locked, current_taskid, \"desc\" AS description, update_time
             FROM tasklock WHERE lockid = ?",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("{id}")))?
            .try_into_record()
    }

    /// Compare-and-set `locked` 0 -> 1, stamping the holder.
    ///
    /// Returns `false` when the lock is already taken.
    pub async fn try_lock_task(&self, id: LockId, holder: Option<i64>) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE tasklock SET locked = 1, current_taskid = ?, update_time = ?
             WHERE lockid = ? AND locked = 0",
        )
        .bind(holder)
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(true);
        }
        self.task_locked(id).await?;
        Ok(false)
    }

    /// Compare-and-set `locked` 1 -> 0. `current_taskid` is left as is.
    ///
    /// Returns `false` when the lock was not taken.
    pub async fn unlock_task(&self, id: LockId) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE tasklock SET locked = 0, update_time = ? WHERE lockid = ? AND locked = 1",
        )
        .bind(chrono::Utc::now())
        .bind(id.0)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(true);
        }
        self.task_locked(id).await?;
        Ok(false)
    }

    /// Current value of the `locked` flag.
    pub async fn task_locked(&self, id: LockId) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT locked FROM tasklock WHERE lockid = ?")
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;
        let (raw,) = row.ok_or_else(|| Error::NotFound(format!("{id}")))?;
        decode_flag(raw, &id.to_string())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct TaskLockRow {
    lockid: i64,
    locked: i64,
    current_taskid: Option<i64>,
    description: String,
    update_time: chrono::DateTime<chrono::Utc>,
}

impl TaskLockRow {
    fn try_into_record(self) -> Result<TaskLockRecord> {
        let id = LockId(self.lockid);
        Ok(TaskLockRecord {
            id,
            locked: decode_flag(self.locked, &id.to_string())?,
            current_holder_task_id: self.current_taskid,
            description: self.description,
            updated_at: self.update_time,
        })
    }
}
