//! Join metrics registry
//!
//! - Counters only, monotonic
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for the join engine.
///
/// Uses Relaxed ordering; counters are independent of each other.
#[derive(Debug, Default)]
pub struct JoinMetrics {
    pipelines_run: AtomicU64,
    pipelines_failed: AtomicU64,
    stages_completed: AtomicU64,
    stages_failed: AtomicU64,
    batches_issued: AtomicU64,
    documents_fetched: AtomicU64,
    documents_merged: AtomicU64,
    documents_unmatched: AtomicU64,
    records_dropped: AtomicU64,
}

impl JoinMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_pipelines(&self) {
        self.pipelines_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pipeline_failures(&self) {
        self.pipelines_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stages_completed(&self) {
        self.stages_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stage_failures(&self) {
        self.stages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_batches(&self, count: u64) {
        self.batches_issued.fetch_add(count, Ordering::Relaxed);
    }

    /// Documents received from lookups
    pub fn add_documents_fetched(&self, count: u64) {
        self.documents_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_documents_merged(&self, count: u64) {
        self.documents_merged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_documents_unmatched(&self, count: u64) {
        self.documents_unmatched.fetch_add(count, Ordering::Relaxed);
    }

    /// Records removed by inner joins
    pub fn add_records_dropped(&self, count: u64) {
        self.records_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pipelines_run: self.pipelines_run.load(Ordering::Relaxed),
            pipelines_failed: self.pipelines_failed.load(Ordering::Relaxed),
            stages_completed: self.stages_completed.load(Ordering::Relaxed),
            stages_failed: self.stages_failed.load(Ordering::Relaxed),
            batches_issued: self.batches_issued.load(Ordering::Relaxed),
            documents_fetched: self.documents_fetched.load(Ordering::Relaxed),
            documents_merged: self.documents_merged.load(Ordering::Relaxed),
            documents_unmatched: self.documents_unmatched.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub pipelines_run: u64,
    pub pipelines_failed: u64,
    pub stages_completed: u64,
    pub stages_failed: u64,
    pub batches_issued: u64,
    pub documents_fetched: u64,
    pub documents_merged: u64,
    pub documents_unmatched: u64,
    pub records_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(JoinMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = JoinMetrics::new();
        metrics.add_batches(3);
        metrics.add_batches(2);
        metrics.increment_stages_completed();
        metrics.add_records_dropped(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_issued, 5);
        assert_eq!(snapshot.stages_completed, 1);
        assert_eq!(snapshot.records_dropped, 4);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(JoinMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.add_documents_fetched(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().documents_fetched, 8000);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(JoinMetrics::new().snapshot()).unwrap();
        assert_eq!(json["batches_issued"], 0);
    }
}
