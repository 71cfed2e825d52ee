//! In-memory change watermark.

use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonic unix-millisecond timestamp of the last observed change.
///
/// Starts at 0 on every process start; the change feed falls back to the
/// change log when a poller's watermark is ahead of it.
#[derive(Debug, Default)]
pub struct Watermark(AtomicI64);

impl Watermark {
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Moves the watermark to `ts` unless it is already later.
    pub fn advance(&self, ts: i64) -> i64 {
        let previous = self.0.fetch_max(ts, Ordering::AcqRel);
        let current = previous.max(ts);
        crate::observability::metrics::set_watermark(current);
        current
    }
}
