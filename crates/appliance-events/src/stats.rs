//! Event bus statistics
//!
//! Counters are plain atomics: producers on any thread (including the ISR
//! path) bump `published`/`dropped`, while only the dispatching context
//! writes `processed` and the handling-time average.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Snapshot of event bus statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Events that passed the filter (admitted or not)
    pub total_published: u64,
    /// Events fully dispatched
    pub total_processed: u64,
    /// Events rejected by a full queue, at publish or re-queue time
    pub total_dropped: u64,
    /// Events currently pending
    pub queue_len: usize,
    /// Configured queue capacity (0 when uninitialized)
    pub queue_capacity: usize,
    /// Active subscriptions
    pub subscriber_count: usize,
    /// Recency-biased average time spent dispatching one event
    pub avg_handle_time_us: u64,
}

impl EventBusStats {
    /// Fraction of published events that were dropped.
    pub fn drop_rate(&self) -> f64 {
        if self.total_published == 0 {
            return 0.0;
        }
        self.total_dropped as f64 / self.total_published as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    published: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    avg_handle_us: AtomicU64,
    subscribers: AtomicUsize,
}

impl Counters {
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dispatched event and fold its handling time into the average.
    ///
    /// The average is `(previous + sample) / 2`: allocation-free and heavily
    /// weighted toward the latest events. Only the dispatching context calls
    /// this, so the load/store pair does not race with itself.
    pub(crate) fn record_processed(&self, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);

        let sample = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let previous = self.avg_handle_us.load(Ordering::Relaxed);
        let blended = previous / 2 + sample / 2 + (previous % 2 + sample % 2) / 2;
        self.avg_handle_us.store(blended, Ordering::Relaxed);
    }

    pub(crate) fn set_subscribers(&self, count: usize) {
        self.subscribers.store(count, Ordering::Relaxed);
    }

    /// Zero the event counters. The subscriber count tracks the registry and
    /// is left alone.
    pub(crate) fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.avg_handle_us.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, queue_len: usize, queue_capacity: usize) -> EventBusStats {
        EventBusStats {
            total_published: self.published.load(Ordering::Relaxed),
            total_processed: self.processed.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
            queue_len,
            queue_capacity,
            subscriber_count: self.subscribers.load(Ordering::Relaxed),
            avg_handle_time_us: self.avg_handle_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.record_published();
        counters.record_published();
        counters.record_dropped();
        counters.set_subscribers(3);

        let stats = counters.snapshot(1, 8);
        assert_eq!(stats.total_published, 2);
        assert_eq!(stats.total_dropped, 1);
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.queue_len, 1);
        assert_eq!(stats.queue_capacity, 8);
        assert_eq!(stats.subscriber_count, 3);
        assert!((stats.drop_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_is_recency_biased() {
        let counters = Counters::default();
        counters.record_processed(Duration::from_micros(100));
        assert_eq!(counters.snapshot(0, 0).avg_handle_time_us, 50);

        counters.record_processed(Duration::from_micros(100));
        assert_eq!(counters.snapshot(0, 0).avg_handle_time_us, 75);

        counters.record_processed(Duration::from_micros(1));
        assert_eq!(counters.snapshot(0, 0).avg_handle_time_us, 38);
        assert_eq!(counters.snapshot(0, 0).total_processed, 3);
    }

    #[test]
    fn test_reset_keeps_subscribers() {
        let counters = Counters::default();
        counters.record_published();
        counters.record_processed(Duration::from_micros(10));
        counters.set_subscribers(2);

        counters.reset();
        let stats = counters.snapshot(0, 4);
        assert_eq!(stats.total_published, 0);
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.avg_handle_time_us, 0);
        assert_eq!(stats.subscriber_count, 2);
    }

    #[test]
    fn test_drop_rate_without_traffic() {
        assert_eq!(EventBusStats::default().drop_rate(), 0.0);
    }
}
