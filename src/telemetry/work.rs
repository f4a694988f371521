//! Batch processing span helpers.

use tracing::Span;

use crate::model::QueueId;

/// Start a span for processing one batch from a queue.
///
/// `batch.size` is declared empty and filled once the batch is taken.
pub fn start_batch_span(queue_id: QueueId) -> Span {
    tracing::info_span!(
        "batch.process",
        "batch.queue" = queue_id.0,
        "batch.size" = tracing::field::Empty,
    )
}

/// Record the size of the batch on its span.
pub fn record_batch_size(span: &Span, size: usize) {
    span.record("batch.size", size);
}

/// Record one item's outcome as an event on the batch span.
pub fn record_item_outcome(span: &Span, mark: &str, ok: bool) {
    span.in_scope(|| {
        tracing::debug!(mark = mark, ok = ok, "item_outcome");
    });
}
