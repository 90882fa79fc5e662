use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for the three pipelines.
#[derive(Default)]
pub struct RelayMetrics {
    documents_summarized: AtomicU64,
    questions_answered: AtomicU64,
    searches_served: AtomicU64,
    upstream_failures: AtomicU64,
}

impl RelayMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed document summary.
    pub fn record_summary(&self) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed chat answer.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed search.
    pub fn record_search(&self) {
        self.searches_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a pipeline that ended in an extraction or provider failure.
    pub fn record_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            searches_served: self.searches_served.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Uploads that produced a summary.
    pub documents_summarized: u64,
    /// Chat transcripts that produced an answer.
    pub questions_answered: u64,
    /// Searches that returned results (possibly empty).
    pub searches_served: u64,
    /// Requests that failed during extraction or at a provider.
    pub upstream_failures: u64,
}
