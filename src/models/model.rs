//! Gaussian and Lorentzian line shapes.
//!
//! The fitted model is
//!
//! ```text
//! y(f) = offset + amplitude * g((f - center) / width)
//! ```
//!
//! with unit-height shapes
//!
//! - Gaussian: `g(u) = exp(-u² / 2)` (`width` = sigma)
//! - Lorentzian: `g(u) = 1 / (1 + u²)` (`width` = half width at half maximum)
//!
//! The optimizer works on `ln(width)` so the width stays positive; the Jacobian
//! row below is written for the parameter vector
//! `[offset, amplitude, center, ln(width)]`.

use crate::domain::ShapeKind;

/// Number of fitted parameters.
pub const PARAM_COUNT: usize = 4;

/// Unit-height shape evaluated at `f`.
pub fn shape_value(kind: ShapeKind, f: f64, center: f64, width: f64) -> f64 {
    let u = (f - center) / width;
    match kind {
        ShapeKind::Gaussian => (-0.5 * u * u).exp(),
        ShapeKind::Lorentzian => 1.0 / (1.0 + u * u),
    }
}

/// Predict `y(f)` for the parameter vector `[offset, amplitude, center, ln(width)]`.
pub fn predict(kind: ShapeKind, f: f64, params: &[f64]) -> f64 {
    let width = params[3].exp();
    params[0] + params[1] * shape_value(kind, f, params[2], width)
}

/// Fill the Jacobian row `∂y/∂[offset, amplitude, center, ln(width)]` at `f`.
///
/// # Panics
/// Panics if `params` or `out` is shorter than `PARAM_COUNT`.
pub fn fill_jacobian_row(kind: ShapeKind, f: f64, params: &[f64], out: &mut [f64]) {
    let amplitude = params[1];
    let center = params[2];
    let width = params[3].exp();
    let u = (f - center) / width;

    let (g, dg_dcenter, dg_dlnwidth) = match kind {
        ShapeKind::Gaussian => {
            let g = (-0.5 * u * u).exp();
            (g, g * u / width, g * u * u)
        }
        ShapeKind::Lorentzian => {
            let g = 1.0 / (1.0 + u * u);
            let g2 = g * g;
            (g, 2.0 * u * g2 / width, 2.0 * u * u * g2)
        }
    };

    out[0] = 1.0;
    out[1] = g;
    out[2] = amplitude * dg_dcenter;
    out[3] = amplitude * dg_dlnwidth;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_have_unit_height_at_center() {
        for kind in [ShapeKind::Gaussian, ShapeKind::Lorentzian] {
            assert!((shape_value(kind, 10.0, 10.0, 2.0) - 1.0).abs() < 1e-15);
        }
        // Lorentzian HWHM: half height one width away.
        assert!((shape_value(ShapeKind::Lorentzian, 12.0, 10.0, 2.0) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let params = [0.3, -1.2, 100.0, 1.5_f64.ln()];
        let h = 1e-6;
        for kind in [ShapeKind::Gaussian, ShapeKind::Lorentzian] {
            for &f in &[98.0, 99.7, 100.0, 101.1, 104.0] {
                let mut row = [0.0; PARAM_COUNT];
                fill_jacobian_row(kind, f, &params, &mut row);
                for j in 0..PARAM_COUNT {
                    let mut hi = params;
                    let mut lo = params;
                    hi[j] += h;
                    lo[j] -= h;
                    let numeric = (predict(kind, f, &hi) - predict(kind, f, &lo)) / (2.0 * h);
                    assert!(
                        (numeric - row[j]).abs() < 1e-6,
                        "{kind:?} f={f} param {j}: analytic {} vs numeric {numeric}",
                        row[j]
                    );
                }
            }
        }
    }
}
