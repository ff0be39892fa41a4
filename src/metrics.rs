//! Metrics collection for the metalink server
//!
//! Thread-safe counters backed by atomics. They track requests by outcome,
//! response cache usage, upstream fetches and latencies.

use crate::error::MetalinkError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for the metalink server
#[derive(Debug, Default)]
pub struct MetalinkMetrics {
    // Request statistics
    total_requests: AtomicU64,
    served_documents: AtomicU64,
    not_found: AtomicU64,
    invalid_requests: AtomicU64,
    upstream_failures: AtomicU64,
    internal_errors: AtomicU64,

    // Cache statistics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Selection statistics
    mirrors_advertised: AtomicU64,
    resources_advertised: AtomicU64,

    // Latency statistics (stored as microseconds)
    upstream_fetches: AtomicU64,
    total_request_duration_us: AtomicU64,
    total_upstream_duration_us: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub served_documents: u64,
    pub not_found: u64,
    pub invalid_requests: u64,
    pub upstream_failures: u64,
    pub internal_errors: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    pub mirrors_advertised: u64,
    pub resources_advertised: u64,

    pub upstream_fetches: u64,
    pub total_request_duration_us: u64,
    pub total_upstream_duration_us: u64,
}

impl MetalinkMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an incoming `/metalink` request
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document sent to a client
    ///
    /// # Arguments
    /// * `mirrors` - Number of mirrors selected
    /// * `resources` - Number of `<url>` entries after protocol fan-out
    pub fn record_served(&self, mirrors: usize, resources: usize) {
        self.served_documents.fetch_add(1, Ordering::Relaxed);
        self.mirrors_advertised
            .fetch_add(mirrors as u64, Ordering::Relaxed);
        self.resources_advertised
            .fetch_add(resources as u64, Ordering::Relaxed);
    }

    /// Record a failed request by error kind
    pub fn record_error(&self, error: &MetalinkError) {
        let counter = match error {
            MetalinkError::NotFound(_) => &self.not_found,
            MetalinkError::InvalidRequest(_) => &self.invalid_requests,
            e if e.is_upstream() => &self.upstream_failures,
            _ => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one upstream metadata fetch and how long it took
    pub fn record_upstream_fetch(&self, duration: Duration) {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
        self.total_upstream_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record request duration
    pub fn record_request_duration(&self, duration: Duration) {
        self.total_request_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    ///
    /// Fields are loaded independently, so a snapshot taken under load may
    /// not be perfectly consistent across fields.
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            served_documents: self.served_documents.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            mirrors_advertised: self.mirrors_advertised.load(Ordering::Relaxed),
            resources_advertised: self.resources_advertised.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            total_request_duration_us: self.total_request_duration_us.load(Ordering::Relaxed),
            total_upstream_duration_us: self.total_upstream_duration_us.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Calculate cache hit rate as a percentage (0.0 to 100.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate average request duration in milliseconds
    pub fn avg_request_duration_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.total_request_duration_us as f64 / self.total_requests as f64) / 1000.0
        }
    }

    /// Calculate average upstream fetch duration in milliseconds
    pub fn avg_upstream_duration_ms(&self) -> f64 {
        if self.upstream_fetches == 0 {
            0.0
        } else {
            (self.total_upstream_duration_us as f64 / self.upstream_fetches as f64) / 1000.0
        }
    }

    /// Average number of mirrors per served document
    pub fn avg_mirrors_per_document(&self) -> f64 {
        if self.served_documents == 0 {
            0.0
        } else {
            self.mirrors_advertised as f64 / self.served_documents as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_outcomes() {
        let metrics = MetalinkMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_served(2, 3);
        metrics.record_error(&MetalinkError::no_mirrors());
        metrics.record_error(&MetalinkError::InvalidRequest("repo".into()));
        metrics.record_error(&MetalinkError::UpstreamTimeout("slow".into()));
        metrics.record_error(&MetalinkError::CatalogError("bad".into()));

        let stats = metrics.get_stats();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.served_documents, 1);
        assert_eq!(stats.mirrors_advertised, 2);
        assert_eq!(stats.resources_advertised, 3);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.invalid_requests, 1);
        assert_eq!(stats.upstream_failures, 1);
        assert_eq!(stats.internal_errors, 1);
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = MetalinkMetrics::new();

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let stats = metrics.get_stats();
        assert_eq!(stats.cache_hit_rate(), 75.0);
    }

    #[test]
    fn test_rates_with_no_data() {
        let stats = MetalinkMetrics::new().get_stats();
        assert_eq!(stats.cache_hit_rate(), 0.0);
        assert_eq!(stats.avg_request_duration_ms(), 0.0);
        assert_eq!(stats.avg_upstream_duration_ms(), 0.0);
        assert_eq!(stats.avg_mirrors_per_document(), 0.0);
    }

    #[test]
    fn test_durations() {
        let metrics = MetalinkMetrics::new();

        metrics.record_request();
        metrics.record_request_duration(Duration::from_millis(100));
        metrics.record_request();
        metrics.record_request_duration(Duration::from_millis(200));
        metrics.record_upstream_fetch(Duration::from_millis(40));

        let stats = metrics.get_stats();
        assert_eq!(stats.avg_request_duration_ms(), 150.0);
        assert_eq!(stats.upstream_fetches, 1);
        assert_eq!(stats.avg_upstream_duration_ms(), 40.0);
    }

    #[test]
    fn test_thread_safety() {
        let metrics = Arc::new(MetalinkMetrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let metrics_clone = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    metrics_clone.record_request();
                    metrics_clone.record_cache_miss();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = metrics.get_stats();
        assert_eq!(stats.total_requests, 1000);
        assert_eq!(stats.cache_misses, 1000);
    }
}
