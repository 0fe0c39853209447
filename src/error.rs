//! Application-level error type.
//!
//! Library modules return their own typed errors (`GridError`, `ConfigError`,
//! `InstrumentError`, `SweepError`, `TraceError`). At the binary boundary they
//! collapse into `AppError`, which carries the process exit code:
//!
//! - `2`: usage, configuration, or file I/O problem
//! - `3`: not enough data to do what was asked
//! - `4`: instrument failure (connection lost, sweep aborted)

use crate::domain::{ConfigError, TraceError};
use crate::instrument::InstrumentError;
use crate::sweep::{GridError, SweepError};

pub const EXIT_USAGE: u8 = 2;
pub const EXIT_INSUFFICIENT_DATA: u8 = 3;
pub const EXIT_INSTRUMENT: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(EXIT_USAGE, format!("Invalid configuration: {err}"))
    }
}

impl From<GridError> for AppError {
    fn from(err: GridError) -> Self {
        AppError::new(EXIT_USAGE, format!("Invalid frequency grid: {err}"))
    }
}

impl From<TraceError> for AppError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::Empty => AppError::new(EXIT_INSUFFICIENT_DATA, format!("{err}")),
            _ => AppError::new(EXIT_USAGE, format!("Invalid trace: {err}")),
        }
    }
}

impl From<InstrumentError> for AppError {
    fn from(err: InstrumentError) -> Self {
        AppError::new(EXIT_INSTRUMENT, format!("Instrument error: {err}"))
    }
}

impl From<SweepError> for AppError {
    fn from(err: SweepError) -> Self {
        match err {
            SweepError::Config(e) => e.into(),
            SweepError::Grid(e) => e.into(),
            SweepError::Instrument { .. } => AppError::new(EXIT_INSTRUMENT, format!("Sweep aborted: {err}")),
        }
    }
}
