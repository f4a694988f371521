//! Task lock: advisory exclusive lock around a whole unit of work.
//!
//! Unlike the queue lock this never waits. Work under it can run for an
//! unknown time, so a busy lock is reported straight back and the caller
//! decides whether to retry, back off, or skip.

use opentelemetry::KeyValue;
use tracing::{debug, info};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{LockId, TaskLockRecord};
use crate::telemetry::metrics;

/// Handle on one task lock identity.
///
/// Ownership is local to the handle: only the handle whose `acquire`
/// succeeded may release.
pub struct TaskLock {
    db: Db,
    id: LockId,
    holder: Option<i64>,
    owned: bool,
}

impl TaskLock {
    /// Bind to an existing task lock. `holder` is stamped into the record on
    /// each successful acquire.
    pub async fn open(db: Db, id: LockId, holder: Option<i64>) -> Result<Self> {
        db.task_lock_record(id).await?;
        Ok(Self {
            db,
            id,
            holder,
            owned: false,
        })
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    /// Task id this handle stamps into the record when it acquires.
    pub fn holder(&self) -> Option<i64> {
        self.holder
    }

    /// Whether this handle currently owns the lock.
    pub fn owned(&self) -> bool {
        self.owned
    }

    /// Try once to take the lock. `Ok(false)` means someone else holds it.
    ///
    /// A handle that already owns the lock gets `Ok(false)` and keeps ownership.
    pub async fn acquire(&mut self) -> Result<bool> {
        if self.owned {
            return Ok(false);
        }

        let acquired = self.db.try_lock_task(self.id, self.holder).await?;
        metrics::lock_acquisitions().add(
            1,
            &[
                KeyValue::new("kind", "task"),
                KeyValue::new("result", if acquired { "acquired" } else { "busy" }),
            ],
        );

        if acquired {
            self.owned = true;
            debug!(lock = %self.id, holder = ?self.holder, "task lock acquired");
        } else {
            info!(lock = %self.id, "task lock busy");
        }
        Ok(acquired)
    }

    /// Give the lock back.
    ///
    /// `LockNotOwned` if this handle does not own it; `LockNotHeld` if the
    /// record is no longer marked locked. Either way the handle no longer
    /// owns the lock afterwards.
    pub async fn release(&mut self) -> Result<()> {
        if !self.owned {
            return Err(Error::task_lock_not_owned(self.id));
        }

        let cleared = self.db.unlock_task(self.id).await?;
        self.owned = false;
        if !cleared {
            return Err(Error::task_lock_not_held(self.id));
        }
        debug!(lock = %self.id, "task lock released");
        Ok(())
    }

    /// Current `locked` flag in the store, whoever holds it.
    pub async fn locked(&self) -> Result<bool> {
        self.db.task_locked(self.id).await
    }

    /// Full record, including the last holder.
    pub async fn record(&self) -> Result<TaskLockRecord> {
        self.db.task_lock_record(self.id).await
    }
}

impl Drop for TaskLock {
    fn drop(&mut self) {
        if self.owned {
            tracing::warn!(lock = %self.id, "task lock handle dropped while owning the lock");
        }
    }
}
