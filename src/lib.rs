//! EagleEye movement engine library
//!
//! Turns gate-decision records into classified movements, theft alerts and
//! vendor statistics. Exposes modules for integration testing and the binary.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
