//! Registry metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for evaluation passes and handler failures.
#[derive(Debug, Default)]
pub struct Metrics {
    passes_started: AtomicU64,
    passes_completed: AtomicU64,
    passes_discarded: AtomicU64,
    handler_failures: AtomicU64,
    display_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass_started(&self) {
        self.passes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pass_completed(&self) {
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pass_discarded(&self) {
        self.passes_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failed(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn display_failed(&self) {
        self.display_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passes_started: self.passes_started.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_discarded: self.passes_discarded.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            display_failures: self.display_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub passes_started: u64,
    pub passes_completed: u64,
    pub passes_discarded: u64,
    pub handler_failures: u64,
    pub display_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.pass_started();
        metrics.pass_started();
        metrics.pass_completed();
        metrics.pass_discarded();
        metrics.handler_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.passes_started, 2);
        assert_eq!(snapshot.passes_completed, 1);
        assert_eq!(snapshot.passes_discarded, 1);
        assert_eq!(snapshot.handler_failures, 1);
        assert_eq!(snapshot.display_failures, 0);
    }
}
