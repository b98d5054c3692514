//! Per-vendor delivery statistics
//!
//! Vendors are derived from the regional code in the first two characters of
//! the plate. Only ALLOW records count as deliveries. Suspicious exits are
//! counted according to `SuspiciousExitScope`:
//! - `AllowOnly` counts ALERT exits inside the ALLOW-only group, so it is
//!   always zero
//! - `AllDecisions` counts ALERT exits per vendor over every classified record

use crate::domain::types::{ClassifiedRecord, Decision, VendorAnalytics};
use crate::infra::config::{Config, SuspiciousExitScope};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::hash_map::Entry;
use tracing::debug;

/// Vendor label for plates too short to carry a regional code
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

#[derive(Debug, Default)]
struct VendorGroup {
    entries: SmallVec<[DateTime<Utc>; 8]>,
    exits: SmallVec<[DateTime<Utc>; 8]>,
    alert_exits: u32,
}

pub struct AnalyticsAggregator {
    config: Config,
}

impl AnalyticsAggregator {
    pub fn new(config: &Config) -> Self {
        Self { config: config.clone() }
    }

    /// Vendor name for a plate
    pub fn vendor_for_plate(&self, plate: &str) -> String {
        let code: String = plate.chars().take(2).collect();
        if code.chars().count() < 2 {
            return UNKNOWN_VENDOR.to_string();
        }
        self.config.vendor_name(&code.to_uppercase())
    }

    /// Aggregate classified records into per-vendor statistics
    ///
    /// `now` fixes the local calendar date used for `deliveries_today`.
    /// Output is sorted by deliveries today (descending), then vendor name.
    pub fn aggregate(&self, records: &[ClassifiedRecord], now: DateTime<Utc>) -> Vec<VendorAnalytics> {
        let mut groups: FxHashMap<String, VendorGroup> = FxHashMap::default();

        for record in records.iter().filter(|r| r.decision == Decision::Allow) {
            let group = groups.entry(self.vendor_for_plate(&record.plate_text)).or_default();
            if record.is_entry() {
                group.entries.push(record.timestamp);
            } else {
                group.exits.push(record.timestamp);
            }
        }

        match self.config.suspicious_exit_scope() {
            // ALERT exits never survive the ALLOW filter
            SuspiciousExitScope::AllowOnly => {}
            SuspiciousExitScope::AllDecisions => {
                for record in records.iter().filter(|r| r.is_exit() && r.decision == Decision::Alert) {
                    match groups.entry(self.vendor_for_plate(&record.plate_text)) {
                        Entry::Occupied(mut group) => group.get_mut().alert_exits += 1,
                        Entry::Vacant(slot) => {
                            slot.insert(VendorGroup { alert_exits: 1, ..Default::default() });
                        }
                    }
                }
            }
        }

        let today = self.local_date(now);
        let mut vendors: Vec<VendorAnalytics> = groups
            .into_iter()
            .map(|(vendor_name, group)| self.summarize(vendor_name, group, today))
            .collect();

        vendors.sort_by(|a, b| {
            b.deliveries_today
                .cmp(&a.deliveries_today)
                .then_with(|| a.vendor_name.cmp(&b.vendor_name))
        });

        debug!(vendors = %vendors.len(), today = %today, "vendor_analytics_computed");
        vendors
    }

    fn summarize(&self, vendor_name: String, mut group: VendorGroup, today: NaiveDate) -> VendorAnalytics {
        group.exits.sort_unstable();

        let deliveries_today = group
            .entries
            .iter()
            .filter(|&&entry| self.local_date(entry) == today)
            .count() as u32;

        let durations: SmallVec<[f64; 8]> = group
            .entries
            .iter()
            .filter_map(|&entry| Self::matched_exit(&group.exits, entry, self.config.analytics_match_window()))
            .map(|(entry, exit)| (exit - entry).num_milliseconds() as f64 / 60_000.0)
            .collect();

        let average_duration_minutes = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };

        VendorAnalytics {
            vendor_name,
            deliveries_today,
            average_duration_minutes,
            suspicious_exits: group.alert_exits,
            last_delivery_time: group.entries.iter().max().copied(),
        }
    }

    /// Earliest exit strictly after the entry and inside the window (exits sorted ascending)
    fn matched_exit(
        exits: &[DateTime<Utc>],
        entry: DateTime<Utc>,
        window: Duration,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        exits
            .iter()
            .find(|&&exit| exit > entry)
            .filter(|&&exit| exit - entry < window)
            .map(|&exit| (entry, exit))
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.config.utc_offset()).date_naive()
    }
}
