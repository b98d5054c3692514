//! Engine error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Strict ordering mode received a record older than its predecessor
    #[error("record {index} at {current} precedes previous record at {previous}")]
    UnsortedInput { index: usize, previous: DateTime<Utc>, current: DateTime<Utc> },

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed record input (line is 1-based for JSONL, 0 for JSON arrays)
    #[error("failed to parse records from {path} (line {line}): {source}")]
    Parse {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}
