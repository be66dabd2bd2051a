//! Per-task delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a running cursor task.
#[derive(Debug, Default)]
pub(crate) struct TaskMetrics {
    messages_delivered: AtomicU64,
    empty_polls: AtomicU64,
    errors: AtomicU64,
}

impl TaskMetrics {
    pub(crate) fn record_delivery(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TaskMetricsSnapshot {
        TaskMetricsSnapshot {
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot for a subscription's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskMetricsSnapshot {
    /// Messages handed to the listener.
    pub messages_delivered: u64,
    /// Polls that returned no event.
    pub empty_polls: u64,
    /// Errors routed to the error handler.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = TaskMetrics::default();
        metrics.record_delivery();
        metrics.record_delivery();
        metrics.record_empty_poll();
        metrics.record_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_delivered, 2);
        assert_eq!(snapshot.empty_polls, 1);
        assert_eq!(snapshot.errors, 1);
    }
}
