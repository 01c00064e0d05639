use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_scanned: AtomicU64,
    bytes_scanned: AtomicU64,
    frames_published: AtomicU64,
    progress_forwarded: AtomicU64,
    failure_count: AtomicU64,
}

/// Cheap, shareable session counters. Cloning hands out a view onto the
/// same counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rows_scanned: u64,
    pub bytes_scanned: u64,
    pub frames_published: u64,
    pub progress_forwarded: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_bytes(&self, count: u64) {
        self.inner.bytes_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_frames(&self, count: u64) {
        self.inner
            .frames_published
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_progress(&self, count: u64) {
        self.inner
            .progress_forwarded
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_scanned: self.inner.rows_scanned.load(Ordering::Relaxed),
            bytes_scanned: self.inner.bytes_scanned.load(Ordering::Relaxed),
            frames_published: self.inner.frames_published.load(Ordering::Relaxed),
            progress_forwarded: self.inner.progress_forwarded.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}
