//! IO modules - record input and output egress
//!
//! - `source` - Loads RawRecord snapshots from JSON / JSONL files
//! - `egress` - Writes movements, alerts and vendor statistics

pub mod egress;
pub mod source;

// Re-export commonly used types
pub use egress::Egress;
pub use source::{load_records, parse_records};
