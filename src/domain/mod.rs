//! Domain types used throughout the sweep and estimation pipeline.
//!
//! This module defines:
//!
//! - configuration values (`SweepConfig`, `EstimatorConfig`, `GridSpec`)
//! - configuration enums (`Polarity`, `PeakShape`)
//! - sweep records (`SweepPoint`, `SweepResult`)
//! - the estimator input (`Trace`) and outputs (`ResonanceEstimate`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
