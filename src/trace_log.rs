//! Outcome log for one batch.
//!
//! Every `ok`/`fail` rewrites the whole log, not just the new entry, so the
//! stored log is complete up to the last call even if the process dies
//! mid-batch.

use std::fmt::Display;

use opentelemetry::KeyValue;

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{ItemOutcome, QueueId, TracingId};
use crate::telemetry::metrics;

/// Tracer for one batch.
///
/// Marks are whatever the caller passes: an index, the item itself, any
/// other key. They are not checked for uniqueness or against the batch.
pub struct TaskTracing {
    db: Db,
    id: TracingId,
    task_id: QueueId,
    items: Vec<serde_json::Value>,
    entries: Vec<String>,
}

impl TaskTracing {
    /// Persist a new tracing record for `items`. Empty batches are rejected
    /// before anything is written.
    pub async fn start(db: Db, task_id: QueueId, items: Vec<serde_json::Value>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::InvalidArgument(
                "cannot trace an empty batch".to_string(),
            ));
        }
        let id = db.insert_tracing(task_id, &items).await?;
        tracing::debug!(record = %id, queue = %task_id, batch = items.len(), "tracing started");
        Ok(Self {
            db,
            id,
            task_id,
            items,
            entries: Vec::new(),
        })
    }

    pub fn id(&self) -> TracingId {
        self.id
    }

    pub fn task_id(&self) -> QueueId {
        self.task_id
    }

    /// The batch as it was handed in.
    pub fn items(&self) -> &[serde_json::Value] {
        &self.items
    }

    /// Entries recorded so far, in call order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The log as persisted: entries joined by commas.
    pub fn log(&self) -> String {
        self.entries.join(",")
    }

    pub async fn ok(&mut self, mark: impl Display) -> Result<()> {
        self.record(mark, ItemOutcome::Ok).await
    }

    pub async fn fail(&mut self, mark: impl Display) -> Result<()> {
        self.record(mark, ItemOutcome::Fail).await
    }

    /// Append `<mark>:<outcome>` and persist the full log.
    ///
    /// If the write fails the entry is dropped again, keeping memory and
    /// store in step.
    pub async fn record(&mut self, mark: impl Display, outcome: ItemOutcome) -> Result<()> {
        self.entries.push(format!("{mark}:{outcome}"));
        if let Err(e) = self.db.store_tracing_log(self.id, &self.log()).await {
            self.entries.pop();
            return Err(e);
        }
        metrics::trace_outcomes().add(1, &[KeyValue::new("outcome", outcome.to_string())]);
        Ok(())
    }
}
