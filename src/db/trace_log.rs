//! Tracing rows: one per processed batch.

use crate::db::{decode_items, encode_items};
use crate::error::{Error, Result};
use crate::model::{QueueId, TracingId, TracingRecord};

impl super::Db {
    /// Insert a tracing record for a batch. The outcome log starts empty.
    pub async fn insert_tracing(
        &self,
        task_id: QueueId,
        items: &[serde_json::Value],
    ) -> Result<TracingId> {
        let id = sqlx::query(
            "INSERT INTO tasktracing (taskid, start_time, items, tracing) VALUES (?, ?, ?, '')",
        )
        .bind(task_id.0)
        .bind(chrono::Utc::now())
        .bind(encode_items(items)?)
        .execute(self.pool())
        .await?
        .last_insert_rowid();
        Ok(TracingId(id))
    }

    /// Replace the outcome log of a tracing record.
    pub async fn store_tracing_log(&self, id: TracingId, log: &str) -> Result<()> {
        let rows_affected = sqlx::query("UPDATE tasktracing SET tracing = ? WHERE id = ?")
            .bind(log)
            .bind(id.0)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("{id}")));
        }
        Ok(())
    }

    /// Get a tracing record by ID.
    pub async fn tracing_record(&self, id: TracingId) -> Result<TracingRecord> {
        let row: Option<TracingRow> = sqlx::query_as(
            "SELECT id, taskid, start_time, items, tracing FROM tasktracing WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("{id}")))?
            .try_into_record()
    }

    /// Most recent tracing records for a queue, newest first.
    pub async fn recent_tracing(&self, task_id: QueueId, limit: i64) -> Result<Vec<TracingRecord>> {
        let rows: Vec<TracingRow> = sqlx::query_as(
            "SELECT id, taskid, start_time, items, tracing FROM tasktracing
             WHERE taskid = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(task_id.0)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TracingRow::try_into_record).collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct TracingRow {
    id: i64,
    taskid: i64,
    start_time: chrono::DateTime<chrono::Utc>,
    items: String,
    tracing: Option<String>,
}

impl TracingRow {
    fn try_into_record(self) -> Result<TracingRecord> {
        let id = TracingId(self.id);
        Ok(TracingRecord {
            id,
            task_id: QueueId(self.taskid),
            start_time: self.start_time,
            items_snapshot: decode_items(Some(&self.items), &id.to_string())?,
            outcome_log: self.tracing.unwrap_or_default(),
        })
    }
}
