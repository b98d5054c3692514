//! Integration tests for configuration loading

use chrono::Duration;
use eagleeye_engine::infra::{Config, ExitScope, OrderingMode, SuspiciousExitScope};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[site]
id = "yard-7"
utc_offset_minutes = 330

[normalizer]
unknown_plate = "UNREAD"
default_gate = "Gate A"

[session]
reentry_gap_minutes = 90
recent_entry_minutes = 15
ordering = "strict"

[anomaly]
match_window_hours = 12
working_hours_start = 7
working_hours_end = 19
exit_scope = "all_exits"

[analytics]
match_window_hours = 8
suspicious_exit_scope = "all_decisions"

[analytics.vendors]
rj = "Desert Haulage"

[input]
window_hours = 48
max_records = 500

[watch]
poll_interval_ms = 2000

[egress]
output_dir = "/tmp/eagleeye"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "yard-7");
    assert_eq!(config.utc_offset().local_minus_utc(), 330 * 60);
    assert_eq!(config.unknown_plate(), "UNREAD");
    assert_eq!(config.default_gate(), "Gate A");
    assert_eq!(config.reentry_gap(), Duration::minutes(90));
    assert_eq!(config.recent_entry_window(), Duration::minutes(15));
    assert_eq!(config.ordering(), OrderingMode::Strict);
    assert_eq!(config.anomaly_match_window(), Duration::hours(12));
    assert_eq!(config.working_hours(), (7, 19));
    assert_eq!(config.exit_scope(), ExitScope::AllExits);
    assert_eq!(config.analytics_match_window(), Duration::hours(8));
    assert_eq!(config.suspicious_exit_scope(), SuspiciousExitScope::AllDecisions);
    assert_eq!(config.vendor_name("RJ"), "Desert Haulage");
    assert_eq!(config.vendor_name("MH"), "BuildTech Materials");
    assert_eq!(config.input_window(), Some(Duration::hours(48)));
    assert_eq!(config.max_records(), 500);
    assert_eq!(config.poll_interval_ms(), 2000);
    assert_eq!(config.metrics_interval_secs(), 60);
    assert_eq!(config.output_dir(), Some("/tmp/eagleeye"));
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_partial_config_uses_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[site]\nid = \"gate-only\"\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "gate-only");
    assert_eq!(config.reentry_gap(), Duration::hours(2));
    assert_eq!(config.exit_scope(), ExitScope::AlertOnly);
    assert_eq!(config.suspicious_exit_scope(), SuspiciousExitScope::AllowOnly);
    assert_eq!(config.output_dir(), None);
}

#[test]
fn test_invalid_enum_value_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[session]\nordering = \"shuffle\"\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();

    assert!(format!("{err:#}").contains("Failed to parse config file"));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.unknown_plate(), "Unknown");
    assert_eq!(config.working_hours(), (6, 20));
    assert_eq!(config.ordering(), OrderingMode::Sort);
    assert_eq!(config.config_file(), "default");
}
