//! Provisioning from a TOML manifest.
//!
//! ```toml
//! [[lock]]
//! name = "gc"
//! description = "one collector at a time"
//!
//! [[queue]]
//! name = "gc-jobs"
//! description = "objects to collect"
//! lock = "gc"
//! items = ["GC-A0001", "GC-A0002"]
//! ```
//!
//! Names only link queues to locks inside one manifest; the store knows
//! records by numeric id.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{LockId, QueueId};
use crate::queue::TaskQueue;

/// Top-level TOML wrapper.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "lock")]
    pub locks: Vec<LockSpec>,
    #[serde(default, rename = "queue")]
    pub queues: Vec<QueueSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Name of a lock declared in the same manifest.
    pub lock: Option<String>,
    /// Initial items, in order.
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

/// Ids assigned by [`provision`], in manifest order.
#[derive(Debug, Default)]
pub struct Provisioned {
    pub locks: Vec<(String, LockId)>,
    pub queues: Vec<(String, QueueId)>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        content
            .parse()
            .map_err(|e| Error::Config(format!("bad manifest {}: {e}", path.display())))
    }

    /// Check names are unique and every lock reference resolves.
    pub fn validate(&self) -> Result<()> {
        let mut lock_names = std::collections::HashSet::new();
        for lock in &self.locks {
            if !lock_names.insert(lock.name.as_str()) {
                return Err(Error::Config(format!("duplicate lock name {:?}", lock.name)));
            }
        }
        let mut queue_names = std::collections::HashSet::new();
        for queue in &self.queues {
            if !queue_names.insert(queue.name.as_str()) {
                return Err(Error::Config(format!("duplicate queue name {:?}", queue.name)));
            }
            if let Some(lock) = queue.lock.as_deref().filter(|l| !lock_names.contains(l)) {
                return Err(Error::Config(format!(
                    "queue {:?} refers to undeclared lock {lock:?}",
                    queue.name
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Manifest {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

/// Create every lock and queue in `manifest`, then seed queue items.
///
/// The manifest is validated first; nothing is written if it is inconsistent.
pub async fn provision(db: &Db, manifest: &Manifest) -> Result<Provisioned> {
    manifest.validate()?;

    let mut provisioned = Provisioned::default();
    let mut lock_ids = HashMap::new();

    for lock in &manifest.locks {
        let id = db.create_task_lock(&lock.description).await?;
        tracing::info!(name = %lock.name, lock = %id, "task lock provisioned");
        lock_ids.insert(lock.name.as_str(), id);
        provisioned.locks.push((lock.name.clone(), id));
    }

    for queue in &manifest.queues {
        let lock_id = queue
            .lock
            .as_deref()
            .and_then(|name| lock_ids.get(name).copied());
        let id = db.create_queue(lock_id, &queue.description).await?;
        if !queue.items.is_empty() {
            TaskQueue::open(db.clone(), id)
                .await?
                .put(queue.items.iter().cloned())
                .await?;
        }
        tracing::info!(name = %queue.name, queue = %id, items = queue.items.len(), "queue provisioned");
        provisioned.queues.push((queue.name.clone(), id));
    }

    Ok(provisioned)
}
