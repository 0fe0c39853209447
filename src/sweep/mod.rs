//! Frequency sweep acquisition: grid, controller and progress reporting.

pub mod controller;
pub mod grid;
pub mod observer;

pub use controller::{SweepController, SweepError};
pub use grid::{FrequencyGrid, GridError};
pub use observer::{LogObserver, NullObserver, PointProgress, SweepObserver, TimeEstimate};
