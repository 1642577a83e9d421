use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

/// Receives `(completed, total)` probe counts.
///
/// Calls may arrive out of order when pages are searched concurrently.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, completed: u64, total: u64);
}

/// Reports progress through the log, at `info` every tenth of the run
#[derive(Debug, Default)]
pub struct LogProgress {
    last_decile: AtomicU64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, completed: u64, total: u64) {
        let percent = if total == 0 { 100 } else { completed * 100 / total };
        debug!(completed, total, "Probe completed");

        let decile = percent / 10;
        if self.last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            info!(completed, total, "Scraping progress: {}%", percent);
        }
    }
}

/// Shared probe counter feeding a reporter
pub struct ProgressTracker {
    completed: AtomicU64,
    total: u64,
    reporter: Arc<dyn ProgressReporter>,
}

impl ProgressTracker {
    pub fn new(total: u64, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total,
            reporter,
        }
    }

    /// Count `n` more candidates as done and report
    pub fn advance(&self, n: u64) {
        if n == 0 {
            return;
        }
        let completed = self.completed.fetch_add(n, Ordering::SeqCst) + n;
        self.reporter.report(completed.min(self.total), self.total);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst).min(self.total)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
