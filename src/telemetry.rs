//! Request correlation and in-process counters.
//!
//! Every natural-language query gets a short correlation id that is recorded
//! on its tracing span, so the prompt, statement and failure lines of one
//! request can be found together in the logs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Generate a new correlation ID for request tracing.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short correlation ID (8 characters) for compact logging.
pub fn generate_short_correlation_id() -> String {
    let mut id = generate_correlation_id();
    id.truncate(8);
    id
}

/// Correlation information carried through one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    pub correlation_id: String,
    /// When the request was received.
    pub start_time: Instant,
    /// Operation being served.
    pub operation: &'static str,
}

impl RequestContext {
    /// Create a new request context with a generated correlation ID.
    pub fn new(operation: &'static str) -> Self {
        Self {
            correlation_id: generate_short_correlation_id(),
            start_time: Instant::now(),
            operation,
        }
    }

    /// Get the elapsed time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Outcome counters for natural-language queries.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Queries received.
    pub queries_total: AtomicU64,
    /// Queries answered with rows.
    pub queries_succeeded: AtomicU64,
    /// Queries whose generated statement was rejected or failed.
    pub translations_failed: AtomicU64,
    /// Queries that failed for any other reason.
    pub queries_failed: AtomicU64,
    /// Total time spent on answered queries, in milliseconds.
    pub query_time_ms_total: AtomicU64,
}

impl ServiceMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received query.
    pub fn record_received(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered query.
    pub fn record_success(&self, duration: Duration) {
        self.queries_succeeded.fetch_add(1, Ordering::Relaxed);
        self.query_time_ms_total
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a generated statement that could not be used.
    pub fn record_translation_failure(&self) {
        self.translations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record any other failure.
    pub fn record_failure(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let queries_succeeded = self.queries_succeeded.load(Ordering::Relaxed);
        let query_time_ms_total = self.query_time_ms_total.load(Ordering::Relaxed);

        MetricsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            queries_succeeded,
            translations_failed: self.translations_failed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            query_time_ms_total,
            avg_query_time_ms: average_ms(query_time_ms_total, queries_succeeded),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_succeeded: u64,
    pub translations_failed: u64,
    pub queries_failed: u64,
    pub query_time_ms_total: u64,
    /// Average time of answered queries in milliseconds.
    pub avg_query_time_ms: f64,
}

fn average_ms(total_ms: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total_ms as f64 / count as f64
}

/// Shared metrics type for thread-safe access.
pub type SharedMetrics = Arc<ServiceMetrics>;
