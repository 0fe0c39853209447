//! Line-shape models for the parametric peak fit.
//!
//! Models are implemented as small, pure functions so that the optimizer and
//! the simulator can share them.

pub mod model;

pub use model::*;
