//! `plasma-resonance` library crate.
//!
//! The binary (`resonance`) is a thin wrapper around this library so that:
//!
//! - the sweep controller and estimator are testable without instruments
//! - instruments are swappable behind two small traits
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod instrument;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sweep;
