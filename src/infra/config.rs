//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

/// How the session tracker treats out-of-order input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Stable-sort by timestamp (then id) before tracking
    Sort,
    /// Reject unsorted input with an error
    Strict,
}

/// Which exits the NoMatchingEntry and AfterHoursExit checks look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitScope {
    AlertOnly,
    AllExits,
}

/// Which records `suspiciousExits` is counted over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousExitScope {
    /// Count within the ALLOW-only group (always zero)
    AllowOnly,
    /// Count ALERT exits per vendor over every classified record
    AllDecisions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_id")]
    pub id: String,
    /// Local time offset from UTC used for hour-of-day and calendar date
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id(), utc_offset_minutes: 0 }
    }
}

fn default_site_id() -> String {
    "site".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default = "default_unknown_plate")]
    pub unknown_plate: String,
    #[serde(default = "default_gate")]
    pub default_gate: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { unknown_plate: default_unknown_plate(), default_gate: default_gate() }
    }
}

fn default_unknown_plate() -> String {
    "Unknown".to_string()
}

fn default_gate() -> String {
    "Main Gate".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_reentry_gap_minutes")]
    pub reentry_gap_minutes: i64,
    #[serde(default = "default_recent_entry_minutes")]
    pub recent_entry_minutes: i64,
    #[serde(default = "default_ordering")]
    pub ordering: OrderingMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reentry_gap_minutes: default_reentry_gap_minutes(),
            recent_entry_minutes: default_recent_entry_minutes(),
            ordering: default_ordering(),
        }
    }
}

fn default_reentry_gap_minutes() -> i64 {
    120
}

fn default_recent_entry_minutes() -> i64 {
    30
}

fn default_ordering() -> OrderingMode {
    OrderingMode::Sort
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_match_window_hours")]
    pub match_window_hours: i64,
    #[serde(default = "default_working_hours_start")]
    pub working_hours_start: u32,
    #[serde(default = "default_working_hours_end")]
    pub working_hours_end: u32,
    #[serde(default = "default_exit_scope")]
    pub exit_scope: ExitScope,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            match_window_hours: default_match_window_hours(),
            working_hours_start: default_working_hours_start(),
            working_hours_end: default_working_hours_end(),
            exit_scope: default_exit_scope(),
        }
    }
}

fn default_match_window_hours() -> i64 {
    24
}

fn default_working_hours_start() -> u32 {
    6
}

fn default_working_hours_end() -> u32 {
    20
}

fn default_exit_scope() -> ExitScope {
    ExitScope::AlertOnly
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_match_window_hours")]
    pub match_window_hours: i64,
    #[serde(default = "default_suspicious_exit_scope")]
    pub suspicious_exit_scope: SuspiciousExitScope,
    /// Regional plate code (e.g., "MH") to vendor name
    #[serde(default)]
    pub vendors: HashMap<String, String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            match_window_hours: default_match_window_hours(),
            suspicious_exit_scope: default_suspicious_exit_scope(),
            vendors: HashMap::new(),
        }
    }
}

fn default_suspicious_exit_scope() -> SuspiciousExitScope {
    SuspiciousExitScope::AllowOnly
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub window_hours: Option<i64>,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { window_hours: None, max_records: default_max_records() }
    }
}

fn default_max_records() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EgressConfig {
    /// Directory for movements.json, alerts.json and vendors.json (stdout if unset)
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub egress: EgressConfig,
}

/// Non-negative minute count as a Duration
fn minutes(key: &str, value: i64) -> anyhow::Result<Duration> {
    if value < 0 {
        anyhow::bail!("{key} must not be negative (got {value})");
    }
    Duration::try_minutes(value).with_context(|| format!("{key} out of range: {value}"))
}

/// Non-negative hour count as a Duration
fn hours(key: &str, value: i64) -> anyhow::Result<Duration> {
    if value < 0 {
        anyhow::bail!("{key} must not be negative (got {value})");
    }
    Duration::try_hours(value).with_context(|| format!("{key} out of range: {value}"))
}

/// Main configuration struct used throughout the engine
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    utc_offset: FixedOffset,
    unknown_plate: String,
    default_gate: String,
    reentry_gap: Duration,
    recent_entry_window: Duration,
    ordering: OrderingMode,
    anomaly_match_window: Duration,
    working_hours_start: u32,
    working_hours_end: u32,
    exit_scope: ExitScope,
    analytics_match_window: Duration,
    suspicious_exit_scope: SuspiciousExitScope,
    vendor_names: HashMap<String, String>,
    input_window: Option<Duration>,
    max_records: usize,
    poll_interval_ms: u64,
    metrics_interval_secs: u64,
    output_dir: Option<String>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            utc_offset: Utc.fix(),
            unknown_plate: default_unknown_plate(),
            default_gate: default_gate(),
            reentry_gap: Duration::minutes(default_reentry_gap_minutes()),
            recent_entry_window: Duration::minutes(default_recent_entry_minutes()),
            ordering: OrderingMode::Sort,
            anomaly_match_window: Duration::hours(default_match_window_hours()),
            working_hours_start: default_working_hours_start(),
            working_hours_end: default_working_hours_end(),
            exit_scope: ExitScope::AlertOnly,
            analytics_match_window: Duration::hours(default_match_window_hours()),
            suspicious_exit_scope: SuspiciousExitScope::AllowOnly,
            vendor_names: Self::default_vendor_names(),
            input_window: None,
            max_records: default_max_records(),
            poll_interval_ms: default_poll_interval_ms(),
            metrics_interval_secs: default_metrics_interval_secs(),
            output_dir: None,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    fn default_vendor_names() -> HashMap<String, String> {
        let mut names = HashMap::new();
        names.insert("MH".to_string(), "BuildTech Materials".to_string());
        names.insert("DL".to_string(), "Steel Suppliers Ltd".to_string());
        names.insert("KA".to_string(), "Cement Express".to_string());
        names.insert("TN".to_string(), "Gravel & Sand Co".to_string());
        names.insert("GJ".to_string(), "Brick Masters".to_string());
        names.insert("KL".to_string(), "Timber Traders".to_string());
        names.insert("MP".to_string(), "Heavy Machinery Rentals".to_string());
        names.insert("UP".to_string(), "Lift & Move Services".to_string());
        names
    }

    /// Config file path when --config is not given
    pub fn resolve_config_path() -> String {
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let mut config = Self::from_toml(toml_config)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.config_file = path.display().to_string();
        Ok(config)
    }

    /// Build a config from parsed TOML sections
    pub fn from_toml(toml_config: TomlConfig) -> anyhow::Result<Self> {
        let utc_offset = FixedOffset::east_opt(toml_config.site.utc_offset_minutes * 60)
            .with_context(|| {
                format!("utc_offset_minutes out of range: {}", toml_config.site.utc_offset_minutes)
            })?;

        let session = toml_config.session;
        let anomaly = toml_config.anomaly;
        let analytics = toml_config.analytics;
        if anomaly.working_hours_start > 24 || anomaly.working_hours_end > 24 {
            anyhow::bail!(
                "working hours must be within 0..=24 (got {}..{})",
                anomaly.working_hours_start,
                anomaly.working_hours_end
            );
        }

        // Configured vendors extend and override the built-in table
        let mut vendor_names = Self::default_vendor_names();
        for (code, name) in analytics.vendors {
            vendor_names.insert(code.to_uppercase(), name);
        }

        Ok(Self {
            site_id: toml_config.site.id,
            utc_offset,
            unknown_plate: toml_config.normalizer.unknown_plate,
            default_gate: toml_config.normalizer.default_gate,
            reentry_gap: minutes("session.reentry_gap_minutes", session.reentry_gap_minutes)?,
            recent_entry_window: minutes("session.recent_entry_minutes", session.recent_entry_minutes)?,
            ordering: session.ordering,
            anomaly_match_window: hours("anomaly.match_window_hours", anomaly.match_window_hours)?,
            working_hours_start: anomaly.working_hours_start,
            working_hours_end: anomaly.working_hours_end,
            exit_scope: anomaly.exit_scope,
            analytics_match_window: hours("analytics.match_window_hours", analytics.match_window_hours)?,
            suspicious_exit_scope: analytics.suspicious_exit_scope,
            vendor_names,
            input_window: toml_config
                .input
                .window_hours
                .map(|h| hours("input.window_hours", h))
                .transpose()?,
            max_records: toml_config.input.max_records,
            poll_interval_ms: toml_config.watch.poll_interval_ms,
            metrics_interval_secs: toml_config.watch.metrics_interval_secs,
            output_dir: toml_config.egress.output_dir,
            config_file: "inline".to_string(),
        })
    }

    /// Load configuration from a known path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Vendor name for a two-letter regional code
    pub fn vendor_name(&self, code: &str) -> String {
        self.vendor_names
            .get(code)
            .cloned()
            .unwrap_or_else(|| format!("Vendor {}", code))
    }

    /// Check if a local hour-of-day falls outside working hours
    pub fn is_after_hours(&self, hour: u32) -> bool {
        hour < self.working_hours_start || hour >= self.working_hours_end
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn unknown_plate(&self) -> &str {
        &self.unknown_plate
    }

    pub fn default_gate(&self) -> &str {
        &self.default_gate
    }

    pub fn reentry_gap(&self) -> Duration {
        self.reentry_gap
    }

    pub fn recent_entry_window(&self) -> Duration {
        self.recent_entry_window
    }

    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }

    pub fn anomaly_match_window(&self) -> Duration {
        self.anomaly_match_window
    }

    pub fn working_hours(&self) -> (u32, u32) {
        (self.working_hours_start, self.working_hours_end)
    }

    pub fn exit_scope(&self) -> ExitScope {
        self.exit_scope
    }

    pub fn analytics_match_window(&self) -> Duration {
        self.analytics_match_window
    }

    pub fn suspicious_exit_scope(&self) -> SuspiciousExitScope {
        self.suspicious_exit_scope
    }

    pub fn input_window(&self) -> Option<Duration> {
        self.input_window
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn output_dir(&self) -> Option<&str> {
        self.output_dir.as_deref()
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to override the local time offset
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Builder method to override the ordering mode
    pub fn with_ordering(mut self, ordering: OrderingMode) -> Self {
        self.ordering = ordering;
        self
    }

    /// Builder method to override the anomaly exit scope
    pub fn with_exit_scope(mut self, scope: ExitScope) -> Self {
        self.exit_scope = scope;
        self
    }

    /// Builder method to override the suspicious exit scope
    pub fn with_suspicious_exit_scope(mut self, scope: SuspiciousExitScope) -> Self {
        self.suspicious_exit_scope = scope;
        self
    }

    /// Builder method to override the recent input window
    pub fn with_input_window(mut self, window: Option<Duration>, max_records: usize) -> Self {
        self.input_window = window;
        self.max_records = max_records;
        self
    }

    /// Builder method to override the output directory
    pub fn with_output_dir(mut self, output_dir: Option<String>) -> Self {
        self.output_dir = output_dir;
        self
    }
}
