//! Batching counters
//!
//! Counters only, monotonic, shareable across the coordinators of many
//! transactions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the batching engine
#[derive(Debug, Default)]
pub struct BatchMetrics {
    requests_queued: AtomicU64,
    requests_executed_now: AtomicU64,
    flushes: AtomicU64,
    forced_resets: AtomicU64,
    statements_executed: AtomicU64,
    flush_failures: AtomicU64,
}

impl BatchMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queued(&self) {
        self.requests_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_executed_now(&self) {
        self.requests_executed_now.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_flushes(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_forced_resets(&self) {
        self.forced_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_statements(&self, count: u64) {
        self.statements_executed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_flush_failures(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_queued: self.requests_queued.load(Ordering::Relaxed),
            requests_executed_now: self.requests_executed_now.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            forced_resets: self.forced_resets.load(Ordering::Relaxed),
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub requests_queued: u64,
    pub requests_executed_now: u64,
    pub flushes: u64,
    pub forced_resets: u64,
    pub statements_executed: u64,
    pub flush_failures: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(BatchMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = BatchMetrics::new();
        metrics.increment_queued();
        metrics.increment_queued();
        metrics.increment_executed_now();
        metrics.increment_flushes();
        metrics.increment_forced_resets();
        metrics.add_statements(5);
        metrics.increment_flush_failures();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_queued, 2);
        assert_eq!(snapshot.requests_executed_now, 1);
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.forced_resets, 1);
        assert_eq!(snapshot.statements_executed, 5);
        assert_eq!(snapshot.flush_failures, 1);
    }

    #[test]
    fn test_snapshot_json() {
        let metrics = BatchMetrics::new();
        metrics.add_statements(3);
        let json = metrics.snapshot().to_json();
        assert_eq!(json["statements_executed"], 3);
        assert_eq!(json["flushes"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(BatchMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.increment_queued();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().requests_queued, 800);
    }
}
