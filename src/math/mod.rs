//! Numerical building blocks: least squares (linear and nonlinear),
//! polynomial baselines, Savitzky–Golay smoothing and robust statistics.

pub mod lm;
pub mod ols;
pub mod poly;
pub mod savgol;
pub mod stats;

pub use lm::{LeastSquaresProblem, LmError, LmSolution, levenberg_marquardt};
pub use ols::*;
pub use poly::{Polynomial, polyfit};
pub use savgol::savgol_filter;
pub use stats::{diff_noise_sigma, median};
