//! Services - the movement transformation
//!
//! This module contains the pure components and their composition:
//! - `normalizer` - Drops unusable records, attaches gate and category
//! - `session_tracker` - Per-plate Entry/Exit inference
//! - `anomaly_detector` - Theft alerts over classified movements
//! - `analytics` - Per-vendor delivery statistics
//! - `pipeline` - Runs all of the above over one snapshot

pub mod analytics;
pub mod anomaly_detector;
pub mod normalizer;
pub mod pipeline;
pub mod session_tracker;

// Re-export commonly used types
pub use analytics::AnalyticsAggregator;
pub use anomaly_detector::AnomalyDetector;
pub use normalizer::EventNormalizer;
pub use pipeline::{Pipeline, PipelineOutput, PipelineStats};
pub use session_tracker::SessionTracker;
