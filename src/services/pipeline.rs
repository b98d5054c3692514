//! End-to-end transformation of one record snapshot
//!
//! window -> normalize -> classify -> detect + aggregate
//!
//! Every run starts from scratch: no state survives between calls, so the
//! same snapshot and `now` always give the same output.

use crate::domain::types::{ClassifiedRecord, RawRecord, TheftAlert, VendorAnalytics};
use crate::infra::config::{Config, OrderingMode};
use crate::infra::error::Result;
use crate::infra::metrics::{Metrics, RunCounts};
use crate::services::analytics::AnalyticsAggregator;
use crate::services::anomaly_detector::AnomalyDetector;
use crate::services::normalizer::EventNormalizer;
use crate::services::session_tracker::SessionTracker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Record counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub records_in: usize,
    /// Outside the recent window or over the record cap
    pub records_windowed_out: usize,
    /// Removed by the normalizer (plate sentinel, invalid format)
    pub records_dropped: usize,
    pub records_classified: usize,
    pub entries: usize,
    pub exits: usize,
    pub alerts: usize,
    pub vendors: usize,
}

/// The three output collections of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub site_id: String,
    pub generated_at: DateTime<Utc>,
    /// Classified records, most recent first
    pub movements: Vec<ClassifiedRecord>,
    pub alerts: Vec<TheftAlert>,
    pub vendors: Vec<VendorAnalytics>,
    pub stats: PipelineStats,
}

pub struct Pipeline {
    config: Config,
    normalizer: EventNormalizer,
    tracker: SessionTracker,
    detector: AnomalyDetector,
    aggregator: AnalyticsAggregator,
    metrics: Option<Arc<Metrics>>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            normalizer: EventNormalizer::new(&config),
            tracker: SessionTracker::new(&config),
            detector: AnomalyDetector::new(&config),
            aggregator: AnalyticsAggregator::new(&config),
            metrics: None,
            config,
        }
    }

    /// Create a pipeline with metrics recording
    pub fn with_metrics(config: Config, metrics: Arc<Metrics>) -> Self {
        Self { metrics: Some(metrics), ..Self::new(config) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full transformation over a snapshot
    ///
    /// `now` is the reference time for the recent window and for
    /// "deliveries today". Fails only in strict ordering mode.
    pub fn run(&self, records: &[RawRecord], now: DateTime<Utc>) -> Result<PipelineOutput> {
        let started = Instant::now();
        let run_id = Uuid::now_v7();

        match self.run_inner(records, now) {
            Ok(output) => {
                let latency_us = started.elapsed().as_micros() as u64;
                let stats = output.stats;
                if let Some(ref m) = self.metrics {
                    m.record_run(
                        RunCounts {
                            records_in: stats.records_in as u64,
                            records_dropped: (stats.records_dropped + stats.records_windowed_out) as u64,
                            records_classified: stats.records_classified as u64,
                            alerts: stats.alerts as u64,
                        },
                        latency_us,
                    );
                }
                info!(
                    run_id = %run_id,
                    site = %self.config.site_id(),
                    records_in = %stats.records_in,
                    windowed_out = %stats.records_windowed_out,
                    dropped = %stats.records_dropped,
                    classified = %stats.records_classified,
                    entries = %stats.entries,
                    exits = %stats.exits,
                    alerts = %stats.alerts,
                    vendors = %stats.vendors,
                    latency_us = %latency_us,
                    "pipeline_completed"
                );
                Ok(output)
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.record_run_failure();
                }
                warn!(run_id = %run_id, error = %e, "pipeline_failed");
                Err(e)
            }
        }
    }

    fn run_inner(&self, records: &[RawRecord], now: DateTime<Utc>) -> Result<PipelineOutput> {
        let windowed = self.apply_window(records, now);
        let records_windowed_out = records.len() - windowed.len();

        let normalized = self.normalizer.normalize(&windowed);
        let records_dropped = windowed.len() - normalized.len();
        info!(kept = %normalized.len(), dropped = %records_dropped, "records_normalized");

        let mut movements = match self.config.ordering() {
            OrderingMode::Sort => self.tracker.classify_sorted(normalized),
            OrderingMode::Strict => self.tracker.classify(normalized)?,
        };

        let alerts = self.detector.detect(&movements);
        let vendors = self.aggregator.aggregate(&movements, now);

        movements.sort_by_key(|r| Reverse((r.timestamp, r.id)));

        let entries = movements.iter().filter(|r| r.is_entry()).count();
        let stats = PipelineStats {
            records_in: records.len(),
            records_windowed_out,
            records_dropped,
            records_classified: movements.len(),
            entries,
            exits: movements.len() - entries,
            alerts: alerts.len(),
            vendors: vendors.len(),
        };

        Ok(PipelineOutput {
            site_id: self.config.site_id().to_string(),
            generated_at: now,
            movements,
            alerts,
            vendors,
            stats,
        })
    }

    /// Keep records inside the recent window, capped to the most recent
    /// `max_records` (0 disables the cap). Input order is preserved.
    /// A window reaching past the earliest representable time keeps everything.
    fn apply_window(&self, records: &[RawRecord], now: DateTime<Utc>) -> Vec<RawRecord> {
        let cutoff = self.config.input_window().and_then(|window| now.checked_sub_signed(window));
        let mut kept: Vec<(usize, &RawRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| cutoff.map_or(true, |c| r.timestamp > c))
            .collect();

        let max = self.config.max_records();
        if max > 0 && kept.len() > max {
            kept.sort_by_key(|(_, r)| Reverse((r.timestamp, r.id)));
            kept.truncate(max);
            kept.sort_by_key(|(index, _)| *index);
        }

        kept.into_iter().map(|(_, r)| r.clone()).collect()
    }
}
