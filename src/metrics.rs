use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the chat relay
///
/// Thread-safe atomic counters shared by all request handlers.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Chat requests received
    pub total_requests: AtomicU64,

    /// Requests whose upstream stream was opened and handed to the client
    pub streams_opened: AtomicU64,

    /// Requests refused before reaching the gateway
    pub rejected_requests: AtomicU64,

    /// Gateway answered 429
    pub rate_limited: AtomicU64,

    /// Gateway answered 402
    pub quota_exhausted: AtomicU64,

    /// Any other gateway or transport failure
    pub upstream_failures: AtomicU64,

    /// Body bytes passed through to clients
    pub bytes_relayed: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_exhausted(&self) {
        self.quota_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.bytes_relayed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Share of requests that ended in an open stream, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let opened = self.streams_opened.load(Ordering::Relaxed);
        if total > 0 {
            (opened as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            quota_exhausted: self.quota_exhausted.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
            success_rate: self.success_rate(),
        }
    }
}

/// Immutable snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub streams_opened: u64,
    pub rejected_requests: u64,
    pub rate_limited: u64,
    pub quota_exhausted: u64,
    pub upstream_failures: u64,
    pub bytes_relayed: u64,
    pub success_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Relay Metrics: {} requests ({:.1}% streamed), {} rejected, {} rate limited, {} quota, {} upstream failures, {} bytes",
            self.total_requests,
            self.success_rate,
            self.rejected_requests,
            self.rate_limited,
            self.quota_exhausted,
            self.upstream_failures,
            self.bytes_relayed
        )
    }
}
