//! Event normalization ahead of session tracking
//!
//! Drops records the tracker must never see (unrecognized plates, invalid
//! plate formats) and attaches the gate label and vehicle category.

use crate::domain::keywords;
use crate::domain::types::{NormalizedRecord, RawRecord};
use crate::infra::config::Config;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Rule name the validation layer emits for malformed plates
pub const INVALID_PLATE_RULE: &str = "invalid_plate_format";

/// Gate label derived from the invalid-format rule name
pub const INVALID_PLATE_GATE: &str = "Gate invalid_plate_format";

static GATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bgate\s+([A-Za-z0-9_-]+)").expect("gate pattern is a valid regex")
});

/// Why a record was removed before tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownPlate,
    InvalidPlateFormat,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::UnknownPlate => "unknown_plate",
            DropReason::InvalidPlateFormat => "invalid_plate_format",
        }
    }
}

/// Stateless record filter and enricher
pub struct EventNormalizer {
    unknown_plate: String,
    default_gate: String,
}

impl EventNormalizer {
    pub fn new(config: &Config) -> Self {
        Self {
            unknown_plate: config.unknown_plate().to_string(),
            default_gate: config.default_gate().to_string(),
        }
    }

    /// Normalize a batch, preserving input order
    pub fn normalize(&self, records: &[RawRecord]) -> Vec<NormalizedRecord> {
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            match self.normalize_one(record) {
                Ok(normalized) => kept.push(normalized),
                Err(reason) => {
                    debug!(
                        id = %record.id,
                        plate = %record.plate_text,
                        reason = %reason.as_str(),
                        "record_dropped"
                    );
                }
            }
        }
        kept
    }

    /// Normalize a single record, or report why it was dropped
    pub fn normalize_one(&self, record: &RawRecord) -> Result<NormalizedRecord, DropReason> {
        if record.plate_text.trim().eq_ignore_ascii_case(&self.unknown_plate) {
            return Err(DropReason::UnknownPlate);
        }
        if record.rule_name.as_deref() == Some(INVALID_PLATE_RULE) {
            return Err(DropReason::InvalidPlateFormat);
        }

        let gate_name = self.gate_name(record);
        if gate_name == INVALID_PLATE_GATE {
            return Err(DropReason::InvalidPlateFormat);
        }

        Ok(NormalizedRecord {
            raw: record.clone(),
            gate_name,
            vehicle_category: keywords::vehicle_category(record.description.as_deref()),
        })
    }

    /// Derive the display gate label
    ///
    /// Priority: a rule name mentioning "gate" verbatim, any other rule name
    /// prefixed with "Gate ", a "gate <id>" reference in the description,
    /// then the configured default.
    pub fn gate_name(&self, record: &RawRecord) -> String {
        if let Some(rule) = record.rule_name.as_deref() {
            if rule.to_lowercase().contains("gate") {
                return rule.to_string();
            }
            return format!("Gate {}", rule);
        }

        record
            .description
            .as_deref()
            .and_then(|text| GATE_PATTERN.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|id| format!("Gate {}", id.as_str()))
            .unwrap_or_else(|| self.default_gate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Decision, VehicleCategory};
    use chrono::{TimeZone, Utc};

    fn record(plate: &str) -> RawRecord {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        RawRecord::new(1, plate, Decision::Allow, ts)
    }

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new(&Config::default())
    }

    #[test]
    fn test_drops_unknown_plate_any_case() {
        let n = normalizer();
        assert_eq!(n.normalize_one(&record("Unknown")), Err(DropReason::UnknownPlate));
        assert_eq!(n.normalize_one(&record("unknown")), Err(DropReason::UnknownPlate));
        assert_eq!(n.normalize_one(&record(" UNKNOWN ")), Err(DropReason::UnknownPlate));
    }

    #[test]
    fn test_drops_invalid_plate_format_rule() {
        let raw = record("XX99").with_rule(INVALID_PLATE_RULE);
        assert_eq!(normalizer().normalize_one(&raw), Err(DropReason::InvalidPlateFormat));
    }

    #[test]
    fn test_gate_from_rule_containing_gate() {
        let raw = record("MH12AB1234").with_rule("North_GATE_rule");
        assert_eq!(normalizer().gate_name(&raw), "North_GATE_rule");
    }

    #[test]
    fn test_gate_from_plain_rule() {
        let raw = record("MH12AB1234").with_rule("normal_entry");
        assert_eq!(normalizer().gate_name(&raw), "Gate normal_entry");
    }

    #[test]
    fn test_gate_from_description() {
        let raw = record("MH12AB1234").with_description("Truck arrived at Gate 3B for unloading");
        assert_eq!(normalizer().gate_name(&raw), "Gate 3B");
    }

    #[test]
    fn test_gate_default() {
        let raw = record("MH12AB1234").with_description("Vehicle allowed");
        assert_eq!(normalizer().gate_name(&raw), "Main Gate");
        assert_eq!(normalizer().gate_name(&record("MH12AB1234")), "Main Gate");
    }

    #[test]
    fn test_category_attached() {
        let raw = record("MP10NO1234").with_description("Excavator moving in");
        let normalized = normalizer().normalize_one(&raw).unwrap();
        assert_eq!(normalized.vehicle_category, VehicleCategory::Machinery);
        assert_eq!(normalized.gate_name, "Main Gate");
    }

    #[test]
    fn test_normalize_batch_keeps_order() {
        let raws = vec![
            RawRecord { id: crate::domain::RecordId(1), ..record("MH12AB1234") },
            RawRecord { id: crate::domain::RecordId(2), ..record("Unknown") },
            RawRecord { id: crate::domain::RecordId(3), ..record("DL01CD5678") },
        ];
        let kept = normalizer().normalize(&raws);
        let ids: Vec<i64> = kept.iter().map(|r| r.raw.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
