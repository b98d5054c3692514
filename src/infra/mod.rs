//! Infrastructure - configuration, metrics and errors
//!
//! This module contains infrastructure concerns:
//! - `config` - Engine configuration (TOML loading, defaults)
//! - `metrics` - Lock-free counters for pipeline runs
//! - `error` - Typed engine error

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, ExitScope, OrderingMode, SuspiciousExitScope};
pub use error::{EngineError, Result};
pub use metrics::{Metrics, RunCounts};
