//! Error types for taskq.

use thiserror::Error;

use crate::model::{LockId, QueueId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("queue lock on {queue_id} still held after {attempts} attempts")]
    LockTimeout { queue_id: QueueId, attempts: u32 },

    #[error("lock {0} is not owned by this handle")]
    LockNotOwned(String),

    #[error("lock {0} is not currently held")]
    LockNotHeld(String),

    /// Stored data that cannot be interpreted. Never coerced to a default.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn task_lock_not_owned(id: LockId) -> Self {
        Error::LockNotOwned(format!("task lock {id}"))
    }

    pub(crate) fn task_lock_not_held(id: LockId) -> Self {
        Error::LockNotHeld(format!("task lock {id}"))
    }

    pub(crate) fn queue_lock_not_held(id: QueueId) -> Self {
        Error::LockNotHeld(format!("queue lock on {id}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
