//! Persisted FIFO queue shared by independent processes.
//!
//! `get` and `put` are read-modify-write cycles on one row, serialized across
//! processes by the queue lock. `empty` is a lock-free dirty read.

pub mod lock;

pub use lock::{QueueLock, QueueLockGuard, QueueLockPolicy};

use opentelemetry::KeyValue;
use tracing::debug;

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{LockId, QueueId};
use crate::task_lock::TaskLock;
use crate::telemetry::metrics;
use crate::trace_log::TaskTracing;

/// Handle on one queue identity.
#[derive(Clone)]
pub struct TaskQueue {
    db: Db,
    id: QueueId,
    lock_id: Option<LockId>,
    queue_lock: QueueLock,
}

impl TaskQueue {
    /// Bind to an existing queue. Fails with `NotFound` if it was never provisioned.
    pub async fn open(db: Db, id: QueueId) -> Result<Self> {
        Self::open_with_policy(db, id, QueueLockPolicy::default()).await
    }

    /// Like [`TaskQueue::open`], with explicit queue lock polling parameters.
    pub async fn open_with_policy(db: Db, id: QueueId, policy: QueueLockPolicy) -> Result<Self> {
        let record = db.queue_record(id).await?;
        let queue_lock = QueueLock::new(db.clone(), id, policy);
        Ok(Self {
            db,
            id,
            lock_id: record.lock_id,
            queue_lock,
        })
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Task lock this queue is bound to, if any.
    pub fn lock_id(&self) -> Option<LockId> {
        self.lock_id
    }

    pub fn queue_lock(&self) -> &QueueLock {
        &self.queue_lock
    }

    /// Remove and return up to `n` items from the front; all of them if `n` is `None`.
    pub async fn get(&self, n: Option<i64>) -> Result<Vec<serde_json::Value>> {
        if let Some(n) = n.filter(|n| *n < 0) {
            return Err(Error::InvalidArgument(format!(
                "item count must be non-negative, got {n}"
            )));
        }

        let guard = self.queue_lock.acquire().await?;
        let taken = self.take_front(n).await;
        let released = guard.release().await;
        let taken = taken?;
        released?;

        debug!(queue = %self.id, count = taken.len(), "items taken");
        self.record_operation("get", taken.len());
        Ok(taken)
    }

    /// Append items to the back, keeping their order.
    pub async fn put<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        let items: Vec<serde_json::Value> = items.into_iter().collect();
        let count = items.len();

        let guard = self.queue_lock.acquire().await?;
        let appended = self.append(items).await;
        let released = guard.release().await;
        appended?;
        released?;

        debug!(queue = %self.id, count, "items put");
        self.record_operation("put", count);
        Ok(())
    }

    /// Whether the queue currently holds no items.
    ///
    /// Reads without the queue lock, so the answer may be stale by the time
    /// it is used. Good for skipping a full lock/get cycle, nothing more.
    pub async fn empty(&self) -> Result<bool> {
        Ok(self.db.queue_items(self.id).await?.is_empty())
    }

    /// Task lock handle for this queue, holding on behalf of this queue's id.
    pub async fn task_lock(&self) -> Result<TaskLock> {
        let lock_id = self
            .lock_id
            .ok_or_else(|| Error::NotFound(format!("task lock for {}", self.id)))?;
        TaskLock::open(self.db.clone(), lock_id, Some(self.id.0)).await
    }

    /// Start an outcome log for a batch taken from this queue.
    pub async fn tracer(&self, items: Vec<serde_json::Value>) -> Result<TaskTracing> {
        TaskTracing::start(self.db.clone(), self.id, items).await
    }

    async fn take_front(&self, n: Option<i64>) -> Result<Vec<serde_json::Value>> {
        let mut items = self.db.queue_items(self.id).await?;
        let split = match n {
            Some(n) => usize::try_from(n).map_or(items.len(), |n| n.min(items.len())),
            None => items.len(),
        };
        let remaining = items.split_off(split);
        self.db.store_queue_items(self.id, &remaining).await?;
        Ok(items)
    }

    async fn append(&self, new_items: Vec<serde_json::Value>) -> Result<()> {
        let mut items = self.db.queue_items(self.id).await?;
        items.extend(new_items);
        self.db.store_queue_items(self.id, &items).await
    }

    fn record_operation(&self, operation: &'static str, count: usize) {
        let queue = self.id.0.to_string();
        metrics::queue_operations().add(
            1,
            &[
                KeyValue::new("queue", queue.clone()),
                KeyValue::new("operation", operation),
            ],
        );
        metrics::queue_items().add(
            count as u64,
            &[
                KeyValue::new("queue", queue),
                KeyValue::new("operation", operation),
            ],
        );
    }
}
