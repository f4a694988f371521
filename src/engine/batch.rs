//! Run one batch: lock, take, process, trace, unlock.

use std::future::Future;
use std::time::Instant;

use tracing::{Instrument, info, warn};

use crate::error::Result;
use crate::queue::TaskQueue;
use crate::telemetry::metrics;
use crate::telemetry::work::{record_batch_size, record_item_outcome, start_batch_span};

/// What [`run_batch`] should wrap around the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Hold the queue's task lock for the whole batch.
    pub task_lock: bool,
    /// Record each item's outcome in a tracing log, marked by position.
    pub tracing: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            task_lock: true,
            tracing: true,
        }
    }
}

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing to do.
    Empty,
    /// Another process holds the task lock.
    LockBusy,
    /// This many items were taken and handed to the work function.
    Processed(usize),
}

/// Take everything currently in `queue` and feed it to `work`, one item at a time.
///
/// `work` returns `true` for success. The task lock, when requested, is
/// released on every path out, errors included.
pub async fn run_batch<F, Fut>(
    queue: &TaskQueue,
    options: BatchOptions,
    work: F,
) -> Result<BatchOutcome>
where
    F: FnMut(serde_json::Value) -> Fut,
    Fut: Future<Output = bool>,
{
    if queue.empty().await? {
        return Ok(BatchOutcome::Empty);
    }

    let mut task_lock = None;
    if options.task_lock {
        let mut lock = queue.task_lock().await?;
        if !lock.acquire().await? {
            info!(queue = %queue.id(), lock = %lock.id(), "task lock busy, skipping batch");
            return Ok(BatchOutcome::LockBusy);
        }
        task_lock = Some(lock);
    }

    let span = start_batch_span(queue.id());
    let started = Instant::now();
    let outcome = process(queue, options.tracing, work)
        .instrument(span.clone())
        .await;

    if let Some(mut lock) = task_lock {
        let released = lock.release().await;
        if let Err(ref e) = released {
            warn!(lock = %lock.id(), "task lock release failed: {e}");
        }
        let outcome = outcome?;
        released?;
        finish(queue, outcome, started);
        return Ok(outcome);
    }

    let outcome = outcome?;
    finish(queue, outcome, started);
    Ok(outcome)
}

async fn process<F, Fut>(queue: &TaskQueue, traced: bool, mut work: F) -> Result<BatchOutcome>
where
    F: FnMut(serde_json::Value) -> Fut,
    Fut: Future<Output = bool>,
{
    let items = queue.get(None).await?;
    if items.is_empty() {
        return Ok(BatchOutcome::Empty);
    }
    let count = items.len();
    let span = tracing::Span::current();
    record_batch_size(&span, count);

    if !traced {
        for item in items {
            work(item).await;
        }
        return Ok(BatchOutcome::Processed(count));
    }

    let mut tracer = queue.tracer(items.clone()).await?;
    for (position, item) in items.into_iter().enumerate() {
        let ok = work(item).await;
        record_item_outcome(&span, &position.to_string(), ok);
        if ok {
            tracer.ok(position).await?;
        } else {
            tracer.fail(position).await?;
        }
    }
    Ok(BatchOutcome::Processed(count))
}

fn finish(queue: &TaskQueue, outcome: BatchOutcome, started: Instant) {
    if let BatchOutcome::Processed(count) = outcome {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::batch_duration_ms().record(elapsed_ms, &[]);
        info!(queue = %queue.id(), count, elapsed_ms, "batch processed");
    }
}
