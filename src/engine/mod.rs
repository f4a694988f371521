//! Batch runner: the consumer side built from the queue, task lock and tracer.

pub mod batch;

pub use batch::{BatchOptions, BatchOutcome, run_batch};
