//! Record source - loads a RawRecord snapshot from disk
//!
//! Two layouts are accepted, detected from the first non-whitespace byte:
//! - `[` : a JSON array of records
//! - otherwise: JSONL, one record per line (blank lines skipped)

use crate::domain::types::RawRecord;
use crate::infra::error::{EngineError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load every record in a snapshot file
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|source| EngineError::Io { path: path.display().to_string(), source })?;

    let records = parse_records(&content, &path.display().to_string())?;
    debug!(path = %path.display(), records = %records.len(), "records_loaded");
    Ok(records)
}

/// Parse a snapshot held in memory (`origin` labels errors)
pub fn parse_records(content: &str, origin: &str) -> Result<Vec<RawRecord>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|source| EngineError::Parse { path: origin.to_string(), line: 0, source });
    }

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line)
            .map_err(|source| EngineError::Parse { path: origin.to_string(), line: index + 1, source })?;
        records.push(record);
    }
    Ok(records)
}
