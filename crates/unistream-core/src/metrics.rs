//! Atomic counters for stream observability.
//!
//! All counters use relaxed ordering. They are diagnostic only and never
//! synchronize anything.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide stream operation counters.
pub struct StreamMetrics {
    /// Streams successfully opened.
    pub opened: AtomicU64,
    /// Streams closed (explicitly or on drop).
    pub closed: AtomicU64,
    /// Bytes delivered to callers by read operations.
    pub bytes_read: AtomicU64,
    /// Bytes accepted from callers by write operations.
    pub bytes_written: AtomicU64,
    /// Calls into a backend read/write primitive.
    pub backend_calls: AtomicU64,
    /// Engine read-buffer refills.
    pub refills: AtomicU64,
    /// Engine write-buffer drains.
    pub drains: AtomicU64,
    /// Errors recorded into a stream.
    pub errors: AtomicU64,
}

impl StreamMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            backend_calls: AtomicU64::new(0),
            refills: AtomicU64::new(0),
            drains: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            opened: Self::get(&self.opened),
            closed: Self::get(&self.closed),
            bytes_read: Self::get(&self.bytes_read),
            bytes_written: Self::get(&self.bytes_written),
            backend_calls: Self::get(&self.backend_calls),
            refills: Self::get(&self.refills),
            drains: Self::get(&self.drains),
            errors: Self::get(&self.errors),
        }
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub opened: u64,
    pub closed: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub backend_calls: u64,
    pub refills: u64,
    pub drains: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Streams opened and not yet closed.
    #[must_use]
    pub fn live_streams(&self) -> u64 {
        self.opened.saturating_sub(self.closed)
    }
}

static GLOBAL_METRICS: StreamMetrics = StreamMetrics::new();

/// Global stream metrics.
#[must_use]
pub fn global_metrics() -> &'static StreamMetrics {
    &GLOBAL_METRICS
}
