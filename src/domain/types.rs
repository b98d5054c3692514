//! Shared types for the movement engine

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Newtype wrapper for upstream record IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream authorization outcome for a gate event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Alert,
    LogOnly,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Alert => "ALERT",
            Decision::LogOnly => "LOG_ONLY",
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(Decision::Allow),
            "ALERT" => Ok(Decision::Alert),
            "LOG_ONLY" => Ok(Decision::LogOnly),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// Movement direction through a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "Entry",
            Direction::Exit => "Exit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleCategory {
    MaterialTruck,
    Machinery,
    Staff,
    Unknown,
}

impl VehicleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCategory::MaterialTruck => "Material Truck",
            VehicleCategory::Machinery => "Machinery",
            VehicleCategory::Staff => "Staff",
            VehicleCategory::Unknown => "Unknown",
        }
    }
}

/// One gate-decision event as produced by the recognition and rule layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: RecordId,
    #[serde(alias = "plate_text")]
    pub plate_text: String,
    #[serde(alias = "event_type")]
    pub decision: Decision,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "rule_name")]
    pub rule_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RawRecord {
    pub fn new(id: i64, plate_text: &str, decision: Decision, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: RecordId(id),
            plate_text: plate_text.to_string(),
            decision,
            timestamp,
            rule_name: None,
            description: None,
        }
    }

    pub fn with_rule(mut self, rule_name: &str) -> Self {
        self.rule_name = Some(rule_name.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Timestamps arrive as RFC 3339, naive ISO 8601 (UTC implied) or epoch milliseconds
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an ISO 8601 string or epoch milliseconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            parse_timestamp(value)
                .ok_or_else(|| E::custom(format!("invalid timestamp: {value}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            let ms = i64::try_from(value).map_err(|_| E::custom("epoch ms out of range"))?;
            self.visit_i64(ms)
        }

        fn visit_i64<E>(self, value: i64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            Utc.timestamp_millis_opt(value)
                .single()
                .ok_or_else(|| E::custom(format!("epoch ms out of range: {value}")))
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one read as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// A record that survived normalization, enriched with display labels
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub raw: RawRecord,
    pub gate_name: String,
    pub vehicle_category: VehicleCategory,
}

impl NormalizedRecord {
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.raw.timestamp
    }

    #[inline]
    pub fn plate(&self) -> &str {
        &self.raw.plate_text
    }

    /// Attach the inferred direction
    pub fn classify(self, direction: Direction) -> ClassifiedRecord {
        ClassifiedRecord {
            id: self.raw.id,
            plate_text: self.raw.plate_text,
            decision: self.raw.decision,
            timestamp: self.raw.timestamp,
            rule_name: self.raw.rule_name,
            description: self.raw.description,
            vehicle_category: self.vehicle_category,
            gate_name: self.gate_name,
            direction,
        }
    }
}

/// A gate event with its inferred Entry/Exit direction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRecord {
    pub id: RecordId,
    pub plate_text: String,
    pub decision: Decision,
    pub timestamp: DateTime<Utc>,
    pub rule_name: Option<String>,
    pub description: Option<String>,
    pub vehicle_category: VehicleCategory,
    pub gate_name: String,
    pub direction: Direction,
}

impl ClassifiedRecord {
    #[inline]
    pub fn is_exit(&self) -> bool {
        self.direction == Direction::Exit
    }

    #[inline]
    pub fn is_entry(&self) -> bool {
        self.direction == Direction::Entry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AlertType {
    UnauthorizedExit,
    NoMatchingEntry,
    AfterHoursExit,
}

impl AlertType {
    pub fn message(&self) -> &'static str {
        match self {
            AlertType::UnauthorizedExit => "Unauthorized material movement detected",
            AlertType::NoMatchingEntry => "Vehicle exited without recorded entry",
            AlertType::AfterHoursExit => "Material movement detected outside working hours",
        }
    }

    /// Short key used in alert IDs
    pub fn slug(&self) -> &'static str {
        match self {
            AlertType::UnauthorizedExit => "unauthorized",
            AlertType::NoMatchingEntry => "no-entry",
            AlertType::AfterHoursExit => "after-hours",
        }
    }
}

/// A suspicious vehicle movement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TheftAlert {
    pub id: String,
    /// Source record, kept for ordering
    #[serde(skip)]
    pub record_id: RecordId,
    pub plate_number: String,
    pub alert_type: AlertType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl TheftAlert {
    pub fn for_record(record: &ClassifiedRecord, alert_type: AlertType) -> Self {
        Self {
            id: format!("{}-{}", record.id, alert_type.slug()),
            record_id: record.id,
            plate_number: record.plate_text.clone(),
            alert_type,
            message: alert_type.message().to_string(),
            timestamp: record.timestamp,
            description: record.description.clone().unwrap_or_default(),
        }
    }
}

/// Per-vendor delivery statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorAnalytics {
    pub vendor_name: String,
    pub deliveries_today: u32,
    pub average_duration_minutes: Option<f64>,
    pub suspicious_exits: u32,
    pub last_delivery_time: Option<DateTime<Utc>>,
}
