//! # taskq
//!
//! A persisted work-item queue shared by independent processes through one
//! SQLite file.
//!
//! Producers `put` items, consumers `get` batches. A polling queue lock makes
//! each get/put atomic across processes, a non-blocking task lock serializes
//! whole units of work, and a tracing log records each batch's per-item
//! outcomes.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod queue;
pub mod setup;
pub mod task_lock;
pub mod telemetry;
pub mod trace_log;

pub use error::{Error, Result};
pub use queue::TaskQueue;
pub use task_lock::TaskLock;
pub use trace_log::TaskTracing;
