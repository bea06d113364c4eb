use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ports::{FlushReason, Metrics};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub retries: u64,
    pub max_backoff_hits: u64,
    pub files_archived: u64,
    pub files_skipped: u64,
    pub flushes_by_size: u64,
    pub flushes_by_age: u64,
    pub flushes_on_shutdown: u64,
    pub bytes_uploaded: u64,
    pub delete_failures: u64,
}

/// Process-local counters. Labels are not split out; every retry counts once.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    retries: AtomicU64,
    max_backoff_hits: AtomicU64,
    files_archived: AtomicU64,
    files_skipped: AtomicU64,
    flushes_by_size: AtomicU64,
    flushes_by_age: AtomicU64,
    flushes_on_shutdown: AtomicU64,
    bytes_uploaded: AtomicU64,
    delete_failures: AtomicU64,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            retries: self.retries.load(Ordering::Relaxed),
            max_backoff_hits: self.max_backoff_hits.load(Ordering::Relaxed),
            files_archived: self.files_archived.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            flushes_by_size: self.flushes_by_size.load(Ordering::Relaxed),
            flushes_by_age: self.flushes_by_age.load(Ordering::Relaxed),
            flushes_on_shutdown: self.flushes_on_shutdown.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
        }
    }
}

impl Metrics for CounterMetrics {
    fn call_retried(&self, _label: &str) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn max_backoff_reached(&self, _label: &str) {
        self.max_backoff_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn file_archived(&self) {
        self.files_archived.fetch_add(1, Ordering::Relaxed);
    }

    fn file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn archive_flushed(&self, reason: FlushReason, payload_bytes: u64) {
        let counter = match reason {
            FlushReason::Size => &self.flushes_by_size,
            FlushReason::Age => &self.flushes_by_age,
            FlushReason::Shutdown => &self.flushes_on_shutdown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded
            .fetch_add(payload_bytes, Ordering::Relaxed);
    }

    fn delete_failed(&self) {
        self.delete_failures.fetch_add(1, Ordering::Relaxed);
    }
}
