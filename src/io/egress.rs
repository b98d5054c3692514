//! Output egress - writes the three pipeline collections
//!
//! With an output directory, each run replaces `movements.json`,
//! `alerts.json` and `vendors.json` there (written to a temp file, then
//! renamed, so readers never see a half-written file). Without one, the
//! whole `PipelineOutput` is printed to stdout as a single JSON document.

use crate::infra::error::{EngineError, Result};
use crate::services::pipeline::PipelineOutput;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MOVEMENTS_FILE: &str = "movements.json";
pub const ALERTS_FILE: &str = "alerts.json";
pub const VENDORS_FILE: &str = "vendors.json";

/// Egress writer for pipeline output
pub struct Egress {
    output_dir: Option<PathBuf>,
}

impl Egress {
    pub fn new(output_dir: Option<&str>) -> Self {
        match output_dir {
            Some(dir) => info!(output_dir = %dir, "egress_initialized"),
            None => info!(output_dir = "stdout", "egress_initialized"),
        }
        Self { output_dir: output_dir.map(PathBuf::from) }
    }

    /// Write one run's output to the configured target
    pub fn write(&self, output: &PipelineOutput) -> Result<()> {
        match self.output_dir {
            Some(ref dir) => self.write_files(dir, output),
            None => {
                let stdout = std::io::stdout();
                Self::write_document(stdout.lock(), output)
            }
        }
    }

    /// Write the combined document to any writer
    pub fn write_document<W: Write>(mut writer: W, output: &PipelineOutput) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, output)?;
        writeln!(writer).map_err(|source| EngineError::Io { path: "<document>".to_string(), source })?;
        Ok(())
    }

    fn write_files(&self, dir: &Path, output: &PipelineOutput) -> Result<()> {
        fs::create_dir_all(dir).map_err(|source| EngineError::Io { path: dir.display().to_string(), source })?;

        Self::replace_file(&dir.join(MOVEMENTS_FILE), &output.movements)?;
        Self::replace_file(&dir.join(ALERTS_FILE), &output.alerts)?;
        Self::replace_file(&dir.join(VENDORS_FILE), &output.vendors)?;

        info!(
            output_dir = %dir.display(),
            movements = %output.movements.len(),
            alerts = %output.alerts.len(),
            vendors = %output.vendors.len(),
            "egress_written"
        );
        Ok(())
    }

    fn replace_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| EngineError::Io { path: path.display().to_string(), source };

        fs::write(&tmp, &json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(file = %path.display(), bytes = %json.len(), "egress_file_replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Decision, RawRecord};
    use crate::infra::config::Config;
    use crate::services::pipeline::Pipeline;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn output() -> PipelineOutput {
        let records = vec![
            RawRecord::new(1, "MH12AB1234", Decision::Allow, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
            RawRecord::new(2, "DL01CD5678", Decision::Alert, Utc.with_ymd_and_hms(2025, 3, 1, 21, 0, 0).unwrap())
                .with_description("Blacklisted vehicle detected: DL01CD5678 - Exit"),
        ];
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap();
        Pipeline::new(Config::default()).run(&records, now).unwrap()
    }

    #[test]
    fn test_writes_three_files() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("out");
        let egress = Egress::new(out_dir.to_str());

        egress.write(&output()).unwrap();

        let movements: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join(MOVEMENTS_FILE)).unwrap()).unwrap();
        assert_eq!(movements.as_array().unwrap().len(), 2);
        assert_eq!(movements[0]["plateText"], "DL01CD5678");
        assert_eq!(movements[0]["direction"], "Exit");
        assert_eq!(movements[0]["decision"], "ALERT");

        let alerts: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join(ALERTS_FILE)).unwrap()).unwrap();
        assert_eq!(alerts[0]["id"], "2-unauthorized");
        assert_eq!(alerts[0]["alertType"], "UnauthorizedExit");

        let vendors: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join(VENDORS_FILE)).unwrap()).unwrap();
        assert_eq!(vendors[0]["vendorName"], "BuildTech Materials");
        assert_eq!(vendors[0]["deliveriesToday"], 1);
        assert!(vendors[0]["averageDurationMinutes"].is_null());
    }

    #[test]
    fn test_rewrite_replaces_previous_output() {
        let dir = tempdir().unwrap();
        let egress = Egress::new(dir.path().to_str());
        let mut first = output();
        egress.write(&first).unwrap();

        first.alerts.clear();
        egress.write(&first).unwrap();

        let alerts: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(ALERTS_FILE)).unwrap()).unwrap();
        assert_eq!(alerts, serde_json::json!([]));
        assert!(!dir.path().join("alerts.json.tmp").exists());
    }

    #[test]
    fn test_write_document() {
        let mut buf = Vec::new();

        Egress::write_document(&mut buf, &output()).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(doc["siteId"], "site");
        assert_eq!(doc["stats"]["recordsClassified"], 2);
        assert_eq!(doc["alerts"].as_array().unwrap().len(), 3);
        assert!(buf.ends_with(b"\n"));
    }
}
