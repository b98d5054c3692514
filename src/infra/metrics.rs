//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics so a watch loop and the pipeline can record concurrently.
//! Reporting swaps the periodic counters to zero; monotonic totals are
//! only ever loaded.
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only and must not drive logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for pipeline run latency (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Counts from a single pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub records_in: u64,
    pub records_dropped: u64,
    pub records_classified: u64,
    pub alerts: u64,
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Pipeline runs completed (monotonic)
    runs_total: AtomicU64,
    /// Runs since last report (reset on report)
    runs_since_report: AtomicU64,
    /// Raw records fed to the pipeline (monotonic)
    records_in_total: AtomicU64,
    /// Records removed before classification: outside the input window,
    /// over the record cap, or dropped at normalization (monotonic)
    records_dropped_total: AtomicU64,
    /// Records that received a direction (monotonic)
    records_classified_total: AtomicU64,
    /// Alerts raised (monotonic)
    alerts_total: AtomicU64,
    /// Runs that failed to load input or rejected it (monotonic)
    run_failures_total: AtomicU64,
    /// Sum of run latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max run latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Run latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            runs_total: AtomicU64::new(0),
            runs_since_report: AtomicU64::new(0),
            records_in_total: AtomicU64::new(0),
            records_dropped_total: AtomicU64::new(0),
            records_classified_total: AtomicU64::new(0),
            alerts_total: AtomicU64::new(0),
            run_failures_total: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a completed pipeline run (lock-free)
    #[inline]
    pub fn record_run(&self, counts: RunCounts, latency_us: u64) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        self.runs_since_report.fetch_add(1, Ordering::Relaxed);
        self.records_in_total.fetch_add(counts.records_in, Ordering::Relaxed);
        self.records_dropped_total.fetch_add(counts.records_dropped, Ordering::Relaxed);
        self.records_classified_total.fetch_add(counts.records_classified, Ordering::Relaxed);
        self.alerts_total.fetch_add(counts.alerts, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_run_failure(&self) {
        self.run_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn runs_total(&self) -> u64 {
        self.runs_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn records_dropped_total(&self) -> u64 {
        self.records_dropped_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        let runs_count = self.runs_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let runs_per_min = if elapsed.as_secs_f64() > 0.0 {
            runs_count as f64 * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let avg_latency = if runs_count > 0 { latency_sum / runs_count } else { 0 };

        MetricsSummary {
            runs_total: self.runs_total.load(Ordering::Relaxed),
            runs_per_min,
            avg_run_latency_us: avg_latency,
            max_run_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            records_in_total: self.records_in_total.load(Ordering::Relaxed),
            records_dropped_total: self.records_dropped_total.load(Ordering::Relaxed),
            records_classified_total: self.records_classified_total.load(Ordering::Relaxed),
            alerts_total: self.alerts_total.load(Ordering::Relaxed),
            run_failures_total: self.run_failures_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub runs_total: u64,
    pub runs_per_min: f64,
    pub avg_run_latency_us: u64,
    pub max_run_latency_us: u64,
    /// Run latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    pub records_in_total: u64,
    pub records_dropped_total: u64,
    pub records_classified_total: u64,
    pub alerts_total: u64,
    pub run_failures_total: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            runs_total = %self.runs_total,
            runs_per_min = format!("{:.1}", self.runs_per_min),
            avg_latency_us = %self.avg_run_latency_us,
            max_latency_us = %self.max_run_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            records_in = %self.records_in_total,
            records_dropped = %self.records_dropped_total,
            records_classified = %self.records_classified_total,
            alerts = %self.alerts_total,
            failures = %self.run_failures_total,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(records_in: u64, dropped: u64, alerts: u64) -> RunCounts {
        RunCounts {
            records_in,
            records_dropped: dropped,
            records_classified: records_in - dropped,
            alerts,
        }
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.runs_total(), 0);
        assert_eq!(metrics.records_dropped_total(), 0);
    }

    #[test]
    fn test_record_run() {
        let metrics = Metrics::new();

        metrics.record_run(counts(10, 2, 1), 100);
        metrics.record_run(counts(5, 0, 0), 200);

        assert_eq!(metrics.runs_total(), 2);
        assert_eq!(metrics.records_dropped_total(), 2);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 300);
    }

    #[test]
    fn test_report() {
        let metrics = Metrics::new();

        metrics.record_run(counts(4, 1, 3), 100);
        metrics.record_run(counts(4, 1, 0), 200);
        metrics.record_run(counts(4, 0, 0), 300);
        metrics.record_run_failure();

        let summary = metrics.report();

        assert_eq!(summary.runs_total, 3);
        assert_eq!(summary.avg_run_latency_us, 200);
        assert_eq!(summary.max_run_latency_us, 300);
        assert_eq!(summary.records_in_total, 12);
        assert_eq!(summary.records_dropped_total, 2);
        assert_eq!(summary.records_classified_total, 10);
        assert_eq!(summary.alerts_total, 3);
        assert_eq!(summary.run_failures_total, 1);

        // Periodic counters reset, totals kept
        assert_eq!(metrics.runs_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_max_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.runs_total(), 3);
    }

    #[test]
    fn test_report_empty() {
        let summary = Metrics::new().report();

        assert_eq!(summary.runs_total, 0);
        assert_eq!(summary.avg_run_latency_us, 0);
        assert_eq!(summary.lat_p99_us, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    m.record_run(counts(1, 0, 0), i as u64);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.runs_total(), 4_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();

        for _ in 0..100 {
            metrics.record_run(RunCounts::default(), 150);
        }

        let summary = metrics.report();

        assert_eq!(summary.lat_buckets[1], 100);
        assert_eq!(summary.lat_p50_us, 200);
        assert_eq!(summary.lat_p99_us, 200);
    }
}
