//! Input/output helpers.
//!
//! - trace CSV read/write (`trace`)
//! - JSON run records and estimate exports (`run`)

pub mod run;
pub mod trace;

pub use run::*;
pub use trace::*;
