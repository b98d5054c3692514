//! Theft alert detection over classified movements
//!
//! Checks per plate:
//! - UnauthorizedExit: every Exit whose decision is ALERT
//! - NoMatchingEntry: a scoped Exit with no earlier Entry of the same plate
//!   inside the match window
//! - AfterHoursExit: a scoped Exit whose local hour is outside working hours
//!
//! "Scoped" exits are ALERT-decision exits by default (`ExitScope::AlertOnly`);
//! `ExitScope::AllExits` widens both checks to every Exit record.

use crate::domain::types::{AlertType, ClassifiedRecord, Decision, TheftAlert};
use crate::infra::config::{Config, ExitScope};
use chrono::{DateTime, Duration, Timelike, Utc};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Reverse;
use tracing::info;

/// Entry timestamps per plate (most plates have a handful of visits)
type EntryIndex<'a> = FxHashMap<&'a str, SmallVec<[DateTime<Utc>; 4]>>;

pub struct AnomalyDetector {
    config: Config,
    match_window: Duration,
    exit_scope: ExitScope,
}

impl AnomalyDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            match_window: config.anomaly_match_window(),
            exit_scope: config.exit_scope(),
        }
    }

    /// Scan classified records and return alerts, most recent first
    pub fn detect(&self, records: &[ClassifiedRecord]) -> Vec<TheftAlert> {
        let entries = Self::index_entries(records);
        let mut alerts = Vec::new();

        for record in records.iter().filter(|r| r.is_exit()) {
            if record.decision == Decision::Alert {
                alerts.push(TheftAlert::for_record(record, AlertType::UnauthorizedExit));
            }

            if !self.in_scope(record) {
                continue;
            }

            if !self.has_matching_entry(&entries, record) {
                alerts.push(TheftAlert::for_record(record, AlertType::NoMatchingEntry));
            }

            if self.is_after_hours(record.timestamp) {
                alerts.push(TheftAlert::for_record(record, AlertType::AfterHoursExit));
            }
        }

        alerts.sort_by_key(|a| (Reverse(a.timestamp), Reverse(a.record_id), a.alert_type));

        for alert in &alerts {
            info!(
                alert_id = %alert.id,
                plate = %alert.plate_number,
                alert_type = ?alert.alert_type,
                timestamp = %alert.timestamp,
                "theft_alert_raised"
            );
        }

        alerts
    }

    fn index_entries(records: &[ClassifiedRecord]) -> EntryIndex<'_> {
        let mut entries: EntryIndex<'_> = FxHashMap::default();
        for record in records.iter().filter(|r| r.is_entry()) {
            entries.entry(record.plate_text.as_str()).or_default().push(record.timestamp);
        }
        entries
    }

    fn in_scope(&self, record: &ClassifiedRecord) -> bool {
        match self.exit_scope {
            ExitScope::AlertOnly => record.decision == Decision::Alert,
            ExitScope::AllExits => true,
        }
    }

    /// An Entry strictly before the exit and less than the match window earlier
    fn has_matching_entry(&self, entries: &EntryIndex<'_>, exit: &ClassifiedRecord) -> bool {
        entries.get(exit.plate_text.as_str()).is_some_and(|times| {
            times
                .iter()
                .any(|&entry| entry < exit.timestamp && exit.timestamp - entry < self.match_window)
        })
    }

    fn is_after_hours(&self, at: DateTime<Utc>) -> bool {
        self.config.is_after_hours(at.with_timezone(&self.config.utc_offset()).hour())
    }
}
