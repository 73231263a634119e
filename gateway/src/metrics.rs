//! Request counters for gateway monitoring.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests received.
    pub requests_total: AtomicU64,
    /// Requests currently being handled.
    pub requests_active: AtomicU64,
    /// Responses with a 2xx status.
    pub responses_success: AtomicU64,
    /// Responses with a 4xx status.
    pub responses_client_error: AtomicU64,
    /// Responses with a 5xx status.
    pub responses_server_error: AtomicU64,
    /// Requests refused by the role guard.
    pub requests_forbidden: AtomicU64,
    /// Requests dropped before a response was produced.
    pub requests_abandoned: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record request received.
    pub fn request_started(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record response sent with `status`.
    pub fn request_finished(&self, status: u16) {
        self.requests_active.fetch_sub(1, Ordering::Relaxed);
        match status {
            200..=299 => self.responses_success.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.responses_client_error.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.responses_server_error.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }

    /// Record request dropped without a response, e.g. on client disconnect.
    pub fn request_abandoned(&self) {
        self.requests_active.fetch_sub(1, Ordering::Relaxed);
        self.requests_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record role guard rejection.
    pub fn request_forbidden(&self) {
        self.requests_forbidden.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_active: self.requests_active.load(Ordering::Relaxed),
            responses_success: self.responses_success.load(Ordering::Relaxed),
            responses_client_error: self.responses_client_error.load(Ordering::Relaxed),
            responses_server_error: self.responses_server_error.load(Ordering::Relaxed),
            requests_forbidden: self.requests_forbidden.load(Ordering::Relaxed),
            requests_abandoned: self.requests_abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_active: u64,
    pub responses_success: u64,
    pub responses_client_error: u64,
    pub responses_server_error: u64,
    pub requests_forbidden: u64,
    pub requests_abandoned: u64,
}
