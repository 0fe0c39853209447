//! Linear least squares on small dense design matrices.
//!
//! Two callers:
//! - polynomial baseline fits (`poly`)
//! - the `(offset, amplitude)` sub-problem of the peak-fit width search,
//!   where the centre and width are held fixed and the model is linear
//!
//! Solved by SVD: the systems are tall (one row per sample, at most six
//! columns) and nalgebra's `QR::solve` only handles square systems.

use nalgebra::{DMatrix, DVector};

/// Coefficients plus the residual sum of squares they leave.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub beta: DVector<f64>,
    pub sse: f64,
}

/// Solve `min ||x·β - y||²`.
///
/// Returns `None` if no finite solution is found even at the loosest tolerance.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // A very wide line shape is nearly constant over the trace and therefore
    // almost collinear with the offset column.
    [1e-10, 1e-8, 1e-6]
        .into_iter()
        .filter_map(|tol| svd.solve(y, tol).ok())
        .find(|beta| beta.iter().all(|v| v.is_finite()))
}

/// Like `solve_least_squares`, also reporting the residual sum of squares.
pub fn fit_linear(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<LinearFit> {
    let beta = solve_least_squares(x, y)?;
    let sse = (y - x * &beta).norm_squared();
    sse.is_finite().then_some(LinearFit { beta, sse })
}
