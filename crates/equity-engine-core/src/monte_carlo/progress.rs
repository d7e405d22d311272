//! Progress reporting and cooperative cancellation for simulation batches.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of batch progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub completed: u64,
    pub total: u64,
    /// Whole percent complete, 0–100
    pub percent: u32,
}

/// Receives progress updates from simulation workers.
///
/// Called from worker threads; implementations must return quickly and
/// hand the update off (to a channel, a log line, a counter) rather than
/// doing work inline.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Counts finished trials and forwards one update per whole-percent step.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    total: u64,
    completed: AtomicU64,
    last_percent: AtomicU32,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, total: u64) -> Self {
        Self {
            sink,
            total,
            completed: AtomicU64::new(0),
            last_percent: AtomicU32::new(0),
        }
    }

    pub(crate) fn trial_finished(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.total == 0 {
            return;
        }
        let percent = (done.saturating_mul(100) / self.total).min(100) as u32;
        // Only the thread that moves the high-water mark reports.
        if self.last_percent.fetch_max(percent, Ordering::Relaxed) < percent {
            self.sink.report(ProgressUpdate {
                completed: done,
                total: self.total,
                percent,
            });
        }
    }
}

/// Cooperative cancellation.
pub trait Cancellable {
    fn is_cancelled(&self) -> bool;
    fn cancel(&self);
}

/// Shared flag a caller flips to abort a running simulation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cancellable for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}
