//! Domain models - gate records and derived movement types
//!
//! This module contains the canonical data types used throughout the engine:
//! - `RawRecord` - a gate decision from the upstream event log
//! - `ClassifiedRecord` - a record with its inferred Entry/Exit direction
//! - `TheftAlert` - a suspicious movement
//! - `VendorAnalytics` - per-vendor delivery statistics
//! - `keywords` - free-text hint tables

pub mod keywords;
pub mod types;

// Re-export commonly used types at module level
pub use types::{
    AlertType, ClassifiedRecord, Decision, Direction, NormalizedRecord, RawRecord, RecordId,
    TheftAlert, VehicleCategory, VendorAnalytics,
};
