//! Core data model.
//!
//! A queue is an ordered list of opaque JSON items plus a short-lived lock flag.
//! A task lock is an advisory, long-lived lock a queue may point at. A tracing
//! record is the outcome log of one batch taken off a queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Queue identity (`taskqueue.taskid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(pub i64);

/// Task lock identity (`tasklock.lockid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(pub i64);

/// Tracing record identity (`tasktracing.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TracingId(pub i64);

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

impl std::fmt::Display for TracingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tracing#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One queue as stored in `taskqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: QueueId,

    /// Task lock guarding batch processing for this queue, if any.
    pub lock_id: Option<LockId>,

    /// Pending items in insertion order.
    pub items: Vec<serde_json::Value>,

    /// Queue lock flag. Held only for the duration of one get or put.
    pub queue_locked: bool,

    pub description: String,
    pub updated_at: DateTime<Utc>,
}

/// One task lock as stored in `tasklock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLockRecord {
    pub id: LockId,
    pub locked: bool,

    /// Task that most recently acquired the lock. Kept after release for audit.
    pub current_holder_task_id: Option<i64>,

    pub description: String,
    pub updated_at: DateTime<Utc>,
}

/// Outcome log of one batch, as stored in `tasktracing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingRecord {
    pub id: TracingId,
    pub task_id: QueueId,
    pub start_time: DateTime<Utc>,

    /// The batch exactly as handed to the tracer.
    pub items_snapshot: Vec<serde_json::Value>,

    /// Comma-joined `<mark>:ok` / `<mark>:fail` entries in call order.
    pub outcome_log: String,
}

impl TracingRecord {
    /// Outcome entries in the order they were recorded.
    ///
    /// A comma only separates entries when the text before it ends in an
    /// outcome, so marks may contain commas. A mark that itself contains
    /// `:ok,` or `:fail,` is still split there.
    pub fn entries(&self) -> Vec<&str> {
        let log = self.outcome_log.as_str();
        if log.is_empty() {
            return Vec::new();
        }
        let mut entries = Vec::new();
        let mut start = 0;
        for (pos, _) in log.match_indices(',') {
            let entry = &log[start..pos];
            if ItemOutcome::ends_entry(entry) {
                entries.push(entry);
                start = pos + 1;
            }
        }
        entries.push(&log[start..]);
        entries
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of processing one item, as written to the outcome log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Ok,
    Fail,
}

impl ItemOutcome {
    fn ends_entry(entry: &str) -> bool {
        entry.ends_with(":ok") || entry.ends_with(":fail")
    }
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemOutcome::Ok => "ok",
            ItemOutcome::Fail => "fail",
        };
        write!(f, "{s}")
    }
}
