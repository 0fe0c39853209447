//! Least-squares polynomial fits (baseline removal).
//!
//! Frequencies sit around 1.7e3 with spans of ~1e2, so raw powers are badly
//! conditioned. We fit in a normalized variable `t = (x - center) / scale`
//! with `t ∈ [-1, 1]` and keep the normalization with the coefficients.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// A fitted polynomial in the normalized variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// Coefficients, constant term first.
    pub coeffs: Vec<f64>,
    pub center: f64,
    pub scale: f64,
}

impl Polynomial {
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.scale;
        // Horner.
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    }
}

/// Fit a polynomial of `degree` to `(x, y)`.
///
/// The degree is lowered to `n - 1` when there are too few points to
/// determine it. Returns `None` for empty or mismatched input, or if the
/// solve fails.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Polynomial> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    let degree = degree.min(x.len() - 1);

    let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let center = 0.5 * (lo + hi);
    let half_span = 0.5 * (hi - lo);
    let scale = if half_span > 0.0 { half_span } else { 1.0 };

    let design = DMatrix::from_fn(x.len(), degree + 1, |i, k| ((x[i] - center) / scale).powi(k as i32));
    let rhs = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &rhs)?;

    Some(Polynomial {
        coeffs: beta.iter().copied().collect(),
        center,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_linear_trend_on_mhz_scale() {
        let x: Vec<f64> = (0..101).map(|i| 1700.0 + i as f64 * 1.5).collect();
        let y: Vec<f64> = x.iter().map(|&f| 0.25 - 0.002 * (f - 1700.0)).collect();
        let p = polyfit(&x, &y, 1).unwrap();
        for (&f, &v) in x.iter().zip(y.iter()) {
            assert!((p.eval(f) - v).abs() < 1e-10);
        }
    }

    #[test]
    fn degree_is_capped_by_point_count() {
        let p = polyfit(&[1.0], &[4.0], 3).unwrap();
        assert_eq!(p.degree(), 0);
        assert!((p.eval(123.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_input() {
        assert!(polyfit(&[], &[], 1).is_none());
        assert!(polyfit(&[1.0, 2.0], &[1.0], 1).is_none());
    }
}
