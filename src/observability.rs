use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Process-wide counters for scheduler activity.
///
/// Lives inside the `OrchestrationContext`; there is no global instance.
#[derive(Debug, Default)]
pub struct RunMetrics {
    pub runs: AtomicU64,
    pub jobs_succeeded: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub jobs_skipped: AtomicU64,
    pub batches: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self, batches: usize) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.batches.fetch_add(batches as u64, Ordering::Relaxed);
    }

    pub fn record_outcomes(&self, succeeded: usize, failed: usize, skipped: usize) {
        self.jobs_succeeded.fetch_add(succeeded as u64, Ordering::Relaxed);
        self.jobs_failed.fetch_add(failed as u64, Ordering::Relaxed);
        self.jobs_skipped.fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> RunStats {
        RunStats {
            runs: self.runs.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_skipped: self.jobs_skipped.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scheduler metrics: runs={}, batches={}, succeeded={}, failed={}, skipped={}",
            stats.runs, stats.batches, stats.jobs_succeeded, stats.jobs_failed, stats.jobs_skipped
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub runs: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_skipped: u64,
    pub batches: u64,
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}
