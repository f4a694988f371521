//! Metric instrument factories for taskq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"taskq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for taskq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("taskq")
}

/// Counter: queue-level operations (get, put).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("taskq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: items moved in or out of queues.
/// Labels: `queue`, `operation`.
pub fn queue_items() -> Counter<u64> {
    meter()
        .u64_counter("taskq.queue.items")
        .with_description("Number of items put into or taken from queues")
        .build()
}

/// Counter: lock acquisition attempts by outcome.
/// Labels: `kind` ("queue" | "task"), `result` ("acquired" | "busy" | "timeout").
pub fn lock_acquisitions() -> Counter<u64> {
    meter()
        .u64_counter("taskq.lock.acquisitions")
        .with_description("Lock acquisition outcomes")
        .build()
}

/// Histogram: polling rounds spent in one queue lock acquisition.
pub fn queue_lock_attempts() -> Histogram<u64> {
    meter()
        .u64_histogram("taskq.queue_lock.attempts")
        .with_description("Attempts needed to acquire a queue lock")
        .build()
}

/// Counter: per-item outcomes written to tracing logs.
/// Labels: `outcome` ("ok" | "fail").
pub fn trace_outcomes() -> Counter<u64> {
    meter()
        .u64_counter("taskq.trace.outcomes")
        .with_description("Item outcomes recorded in tracing logs")
        .build()
}

/// Histogram: batch processing duration in milliseconds.
pub fn batch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskq.batch.duration_ms")
        .with_description("Batch processing duration in milliseconds")
        .with_unit("ms")
        .build()
}
