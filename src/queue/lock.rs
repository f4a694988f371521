//! Queue lock: short-lived mutual exclusion around one queue's item list.
//!
//! Acquisition polls a fixed number of times with a fixed delay. There is no
//! backoff and no fairness between waiters; whoever's compare-and-set lands
//! first wins the round.

use std::time::Duration;

use opentelemetry::KeyValue;
use tracing::{debug, warn};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::QueueId;
use crate::telemetry::metrics;

/// Default number of acquisition attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default pause between two acquisition attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Polling parameters for [`QueueLock::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLockPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for QueueLockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// The queue lock of one queue identity.
#[derive(Clone)]
pub struct QueueLock {
    db: Db,
    queue_id: QueueId,
    policy: QueueLockPolicy,
}

impl QueueLock {
    pub fn new(db: Db, queue_id: QueueId, policy: QueueLockPolicy) -> Self {
        Self {
            db,
            queue_id,
            policy,
        }
    }

    pub fn policy(&self) -> QueueLockPolicy {
        self.policy
    }

    /// Take the lock, polling until it is free or the attempt budget runs out.
    ///
    /// The returned guard is the only way to release the lock. Not reentrant:
    /// acquiring again while holding a guard waits out the full budget.
    pub async fn acquire(&self) -> Result<QueueLockGuard> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            if self.db.try_lock_queue(self.queue_id).await? {
                debug!(queue = %self.queue_id, attempt, "queue lock acquired");
                record_acquisition("acquired", attempt);
                return Ok(QueueLockGuard {
                    db: self.db.clone(),
                    queue_id: self.queue_id,
                    released: false,
                });
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        warn!(queue = %self.queue_id, attempts, "queue lock acquisition timed out");
        record_acquisition("timeout", attempts);
        Err(Error::LockTimeout {
            queue_id: self.queue_id,
            attempts,
        })
    }
}

fn record_acquisition(result: &'static str, attempts: u32) {
    metrics::lock_acquisitions().add(
        1,
        &[
            KeyValue::new("kind", "queue"),
            KeyValue::new("result", result),
        ],
    );
    metrics::queue_lock_attempts().record(u64::from(attempts), &[]);
}

/// Proof of holding a queue lock.
///
/// Must be given back through [`QueueLockGuard::release`]. Dropping it
/// unreleased leaves the flag set in the store.
#[must_use = "a queue lock stays set until the guard is released"]
pub struct QueueLockGuard {
    db: Db,
    queue_id: QueueId,
    released: bool,
}

impl QueueLockGuard {
    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    /// Clear the lock flag.
    ///
    /// Fails with `LockNotHeld` if the flag was cleared behind our back, e.g.
    /// by an operator's forced unlock.
    pub async fn release(mut self) -> Result<()> {
        let cleared = self.db.unlock_queue(self.queue_id).await?;
        self.released = true;
        if !cleared {
            warn!(queue = %self.queue_id, "queue lock was already clear on release");
            return Err(Error::queue_lock_not_held(self.queue_id));
        }
        debug!(queue = %self.queue_id, "queue lock released");
        Ok(())
    }
}

impl Drop for QueueLockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                queue = %self.queue_id,
                "queue lock guard dropped without release; flag left set"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_ten_attempts_one_second_apart() {
        let policy = QueueLockPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.retry_delay, Duration::from_secs(1));
    }
}
