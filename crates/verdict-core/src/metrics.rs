//! Process-wide pipeline counters.
//!
//! Call sites bump a [`Counter`] without logging; [`Metrics::flush`] reports
//! every value in one `tracing::info!` event when a run finishes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// What the pipeline counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Streamed objects handed downstream.
    ObjectsExtracted,
    /// Balanced objects that failed to deserialize.
    ObjectsMalformed,
    RunsStarted,
    /// Chunks that arrived for a superseded run.
    StaleResultsDropped,
    SavesAttempted,
    SavesFailed,
}

impl Counter {
    pub const ALL: [Counter; 6] = [
        Counter::ObjectsExtracted,
        Counter::ObjectsMalformed,
        Counter::RunsStarted,
        Counter::StaleResultsDropped,
        Counter::SavesAttempted,
        Counter::SavesFailed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::ObjectsExtracted => "objects_extracted",
            Counter::ObjectsMalformed => "objects_malformed",
            Counter::RunsStarted => "runs_started",
            Counter::StaleResultsDropped => "stale_results_dropped",
            Counter::SavesAttempted => "saves_attempted",
            Counter::SavesFailed => "saves_failed",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

pub struct Metrics {
    counts: [AtomicU64; Counter::ALL.len()],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const ZERO: AtomicU64 = AtomicU64::new(0);
        Self {
            counts: [ZERO; Counter::ALL.len()],
        }
    }

    pub fn inc(&self, counter: Counter) {
        self.counts[counter.slot()].fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = counter.name(), "counter incremented");
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter.slot()].load(Ordering::Relaxed)
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            objects_extracted = self.get(Counter::ObjectsExtracted),
            objects_malformed = self.get(Counter::ObjectsMalformed),
            runs_started = self.get(Counter::RunsStarted),
            stale_results_dropped = self.get(Counter::StaleResultsDropped),
            saves_attempted = self.get(Counter::SavesAttempted),
            saves_failed = self.get(Counter::SavesFailed),
        );
    }

    /// Zero every counter (tests share the global instance).
    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }
}
