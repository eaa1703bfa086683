//! Translation metrics and observability module.
//!
//! Counters for one pipeline run: cache hit rates, backend calls, code
//! strings that skipped the backend, and low-quality results. One instance per
//! run, shared behind an `Arc` when languages run concurrently.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-run translation metrics.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of strings found in the translation cache (memory or database)
    cache_hits: AtomicUsize,

    /// Number of strings not found in the translation cache
    cache_misses: AtomicUsize,

    /// Number of batch requests made to the translation backend
    api_calls: AtomicUsize,

    /// Number of batch requests that failed after all retries
    api_failures: AtomicUsize,

    /// Number of strings classified as code and never sent to the backend
    code_bypassed: AtomicUsize,

    /// Number of translations scoring below the quality threshold
    low_quality: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit (translation found in cache).
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss (translation not found in cache).
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch request to the translation backend.
    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch request failure.
    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a string that bypassed the backend as code.
    pub fn record_code_bypass(&self) {
        self.code_bypassed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a translation below the quality threshold.
    pub fn record_low_quality(&self) {
        self.low_quality.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    pub fn code_bypassed(&self) -> usize {
        self.code_bypassed.load(Ordering::Relaxed)
    }

    pub fn low_quality(&self) -> usize {
        self.low_quality.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.api_calls();
        let failures = self.api_failures();
        let api_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            api_calls: calls,
            api_failures: failures,
            api_success_rate,
            code_bypassed: self.code_bypassed(),
            low_quality: self.low_quality(),
        }
    }
}

/// Metrics report containing current translation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Number of cache hits
    pub cache_hits: usize,

    /// Number of cache misses
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    /// Number of backend requests made
    pub api_calls: usize,

    /// Number of backend requests that failed
    pub api_failures: usize,

    /// Backend success rate as a percentage (0-100)
    pub api_success_rate: f64,

    /// Number of strings that skipped the backend as code
    pub code_bypassed: usize,

    /// Number of translations below the quality threshold
    pub low_quality: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // ==================== Counter Tests ====================

    #[test]
    fn test_record_cache_hit() {
        let metrics = TranslationMetrics::new();

        assert_eq!(metrics.cache_hits(), 0);
        metrics.record_cache_hit();
        assert_eq!(metrics.cache_hits(), 1);
        metrics.record_cache_hit();
        assert_eq!(metrics.cache_hits(), 2);
    }

    #[test]
    fn test_record_cache_miss() {
        let metrics = TranslationMetrics::new();

        metrics.record_cache_miss();
        assert_eq!(metrics.cache_misses(), 1);
    }

    #[test]
    fn test_record_api_call_and_failure() {
        let metrics = TranslationMetrics::new();

        metrics.record_api_call();
        metrics.record_api_failure();
        assert_eq!(metrics.api_calls(), 1);
        assert_eq!(metrics.api_failures(), 1);
    }

    #[test]
    fn test_record_code_bypass_and_low_quality() {
        let metrics = TranslationMetrics::new();

        metrics.record_code_bypass();
        metrics.record_code_bypass();
        metrics.record_low_quality();
        assert_eq!(metrics.code_bypassed(), 2);
        assert_eq!(metrics.low_quality(), 1);
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_report_empty() {
        let report = TranslationMetrics::new().report();

        assert_eq!(report.cache_hits, 0);
        assert_eq!(report.cache_misses, 0);
        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.api_calls, 0);
        assert_eq!(report.api_failures, 0);
        assert_eq!(report.api_success_rate, 0.0);
    }

    #[test]
    fn test_report_cache_hit_rate() {
        let metrics = TranslationMetrics::new();

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let report = metrics.report();
        assert_eq!(report.cache_hits, 3);
        assert_eq!(report.cache_misses, 1);
        assert_eq!(report.cache_hit_rate, 75.0);
    }

    #[test]
    fn test_report_api_success_rate() {
        let metrics = TranslationMetrics::new();

        // 4 calls, 1 failure = 75% success rate
        for _ in 0..4 {
            metrics.record_api_call();
        }
        metrics.record_api_failure();

        let report = metrics.report();
        assert_eq!(report.api_calls, 4);
        assert_eq!(report.api_failures, 1);
        assert_eq!(report.api_success_rate, 75.0);
    }

    #[test]
    fn test_report_all_api_failures() {
        let metrics = TranslationMetrics::new();

        metrics.record_api_call();
        metrics.record_api_failure();
        metrics.record_api_call();
        metrics.record_api_failure();

        assert_eq!(metrics.report().api_success_rate, 0.0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let metrics = TranslationMetrics::new();
        metrics.record_code_bypass();

        let json = serde_json::to_value(metrics.report()).expect("Should serialize");
        assert_eq!(json["code_bypassed"], 1);
        assert_eq!(json["low_quality"], 0);
    }

    // ==================== Isolation Tests ====================

    #[test]
    fn test_instances_are_independent() {
        let first = TranslationMetrics::new();
        let second = TranslationMetrics::new();

        first.record_cache_hit();
        assert_eq!(first.cache_hits(), 1);
        assert_eq!(second.cache_hits(), 0);
    }

    #[test]
    fn test_shared_instance_counts_across_threads() {
        let metrics = Arc::new(TranslationMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        metrics.record_api_call();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread should not panic");
        }
        assert_eq!(metrics.api_calls(), 100);
    }
}
