//! Method B: nonlinear line-shape fit.
//!
//! The fit runs in two stages:
//!
//! 1. a deterministic grid search over the width. For each candidate width,
//!    with the centre pinned at the seed, the model is linear in
//!    `(offset, amplitude)` and is solved by OLS. The lowest-SSE candidate
//!    seeds stage 2.
//! 2. Levenberg–Marquardt over `[offset, amplitude, center, ln(width)]`.
//!
//! The estimate is rejected (not found) when the optimizer runs out of
//! iterations, a parameter is non-finite, the centre leaves the trace range,
//! or the fitted feature points the wrong way for the configured polarity.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::domain::{EstimateDetail, PeakFit, Polarity, ResonanceEstimate, ShapeKind};
use crate::math::{LeastSquaresProblem, LinearFit, fit_linear, levenberg_marquardt};
use crate::models::{PARAM_COUNT, fill_jacobian_row, predict, shape_value};

/// Fewer points than this cannot constrain four parameters with any slack.
pub const MIN_FIT_POINTS: usize = 5;
/// Number of candidate widths in the seeding grid.
const WIDTH_STEPS: usize = 32;

/// Inputs for one fit.
#[derive(Debug, Clone, Copy)]
pub struct PeakFitRequest<'a> {
    pub frequencies: &'a [f64],
    pub signal: &'a [f64],
    pub shape: ShapeKind,
    pub polarity: Polarity,
    /// Index of the seed centre (normally the Method A extremum).
    pub seed_index: usize,
    pub max_iterations: usize,
}

struct LineShapeProblem<'a> {
    shape: ShapeKind,
    x: &'a [f64],
    y: &'a [f64],
}

impl LeastSquaresProblem for LineShapeProblem<'_> {
    fn param_count(&self) -> usize {
        PARAM_COUNT
    }

    fn observation_count(&self) -> usize {
        self.x.len()
    }

    fn residuals(&self, params: &[f64], out: &mut DVector<f64>) {
        for (i, (&x, &y)) in self.x.iter().zip(self.y).enumerate() {
            out[i] = y - predict(self.shape, x, params);
        }
    }

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
        let mut row = [0.0; PARAM_COUNT];
        for (i, &x) in self.x.iter().enumerate() {
            fill_jacobian_row(self.shape, x, params, &mut row);
            for (j, v) in row.iter().enumerate() {
                out[(i, j)] = *v;
            }
        }
    }
}

/// Seed from the width grid: `(offset, amplitude, width, sse)`.
#[derive(Debug, Clone, Copy)]
struct WidthSeed {
    offset: f64,
    amplitude: f64,
    width: f64,
    sse: f64,
}

pub fn fit_peak(req: &PeakFitRequest<'_>) -> ResonanceEstimate {
    let n = req.frequencies.len();
    if n < MIN_FIT_POINTS {
        return ResonanceEstimate::not_found(format!(
            "need at least {MIN_FIT_POINTS} points for a line-shape fit, got {n}"
        ));
    }
    let first = req.frequencies[0];
    let last = req.frequencies[n - 1];
    let span = last - first;
    let (lo, hi) = req
        .signal
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi - lo <= 1e-12 * lo.abs().max(hi.abs()) {
        return ResonanceEstimate::not_found("signal is flat");
    }
    let seed_center = req.frequencies[req.seed_index.min(n - 1)];

    let Some(seed) = seed_width(req, seed_center, span) else {
        return ResonanceEstimate::not_found("could not seed the line-shape fit");
    };
    debug!(
        "Fit seed: center={seed_center:.4} width={:.4} amplitude={:.4} offset={:.4} sse={:.3e}",
        seed.width, seed.amplitude, seed.offset, seed.sse
    );

    let problem = LineShapeProblem {
        shape: req.shape,
        x: req.frequencies,
        y: req.signal,
    };
    let initial = [seed.offset, seed.amplitude, seed_center, seed.width.ln()];
    let solution = match levenberg_marquardt(&problem, &initial, req.max_iterations) {
        Ok(s) => s,
        Err(e) => return ResonanceEstimate::not_found(format!("line-shape fit failed: {e}")),
    };

    let [offset, amplitude, center, ln_width] = solution.params[..] else {
        return ResonanceEstimate::not_found("line-shape fit returned the wrong parameter count");
    };
    let width = ln_width.exp();
    if ![offset, amplitude, center, width].iter().all(|v| v.is_finite()) || width <= 0.0 {
        return ResonanceEstimate::not_found("line-shape fit produced non-finite parameters");
    }
    if center < first || center > last {
        return ResonanceEstimate::not_found(format!(
            "fitted centre {center:.4} MHz lies outside the trace [{first:.4}, {last:.4}]"
        ));
    }
    if req.polarity.sign() * amplitude <= 0.0 {
        return ResonanceEstimate::not_found(format!(
            "fitted feature is not a {}",
            req.polarity.display_name().to_lowercase()
        ));
    }

    ResonanceEstimate::Found {
        frequency: center,
        detail: EstimateDetail::PeakFit(PeakFit {
            shape: req.shape,
            center,
            width,
            amplitude,
            offset,
            rmse: (solution.sse / n as f64).sqrt(),
            iterations: solution.iterations,
        }),
    }
}

fn seed_width(req: &PeakFitRequest<'_>, center: f64, span: f64) -> Option<WidthSeed> {
    let widths = width_grid(req.frequencies, span);
    let y = DVector::from_column_slice(req.signal);
    let n = req.frequencies.len();

    let mut best: Option<WidthSeed> = None;
    for width in widths {
        let mut x = DMatrix::<f64>::zeros(n, 2);
        for (i, &f) in req.frequencies.iter().enumerate() {
            x[(i, 0)] = 1.0;
            x[(i, 1)] = shape_value(req.shape, f, center, width);
        }
        let Some(LinearFit { beta, sse }) = fit_linear(&x, &y) else {
            continue;
        };
        if best.is_none_or(|b| sse < b.sse) {
            best = Some(WidthSeed {
                offset: beta[0],
                amplitude: beta[1],
                width,
                sse,
            });
        }
    }
    best
}

/// Log-spaced candidate widths from the full span down to four grid steps.
fn width_grid(frequencies: &[f64], span: f64) -> Vec<f64> {
    let step = frequencies
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    let min = (4.0 * step).max(span * 1e-3);
    if !(min.is_finite() && span.is_finite() && min > 0.0 && span > min) {
        return vec![span.max(f64::MIN_POSITIVE)];
    }
    let mut widths = log_space(min, span, WIDTH_STEPS);
    widths.reverse();
    widths
}

/// `steps` log-spaced points between `min` and `max` (inclusive).
fn log_space(min: f64, max: f64, steps: usize) -> Vec<f64> {
    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    (0..steps).map(|i| (ln_min + step * i as f64).exp()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(min: f64, max: f64, step: f64) -> Vec<f64> {
        let n = ((max - min) / step).round() as usize + 1;
        (0..n).map(|i| min + i as f64 * step).collect()
    }

    fn line(shape: ShapeKind, f: &[f64], offset: f64, amplitude: f64, center: f64, width: f64) -> Vec<f64> {
        f.iter()
            .map(|&x| offset + amplitude * shape_value(shape, x, center, width))
            .collect()
    }

    fn request<'a>(f: &'a [f64], y: &'a [f64], shape: ShapeKind, polarity: Polarity, seed: usize) -> PeakFitRequest<'a> {
        PeakFitRequest {
            frequencies: f,
            signal: y,
            shape,
            polarity,
            seed_index: seed,
            max_iterations: 200,
        }
    }

    fn fitted(estimate: &ResonanceEstimate) -> &PeakFit {
        match estimate {
            ResonanceEstimate::Found {
                detail: EstimateDetail::PeakFit(fit),
                ..
            } => fit,
            other => panic!("expected a peak fit, got {other:?}"),
        }
    }

    #[test]
    fn recovers_noiseless_gaussian_peak() {
        let f = grid(1700.0, 1850.0, 0.5);
        let y = line(ShapeKind::Gaussian, &f, 0.2, 1.5, 1776.4, 4.0);
        // Seed a few points off the true centre.
        let seed = f.iter().position(|&x| x >= 1772.0).unwrap();
        let est = fit_peak(&request(&f, &y, ShapeKind::Gaussian, Polarity::Peak, seed));
        let fit = fitted(&est);
        assert!((fit.center - 1776.4).abs() < 1e-3, "{fit:?}");
        assert!((fit.width - 4.0).abs() < 1e-3, "{fit:?}");
        assert!((fit.amplitude - 1.5).abs() < 1e-3, "{fit:?}");
        assert!(fit.rmse < 1e-6);
    }

    #[test]
    fn recovers_noiseless_lorentzian_dip() {
        let f = grid(1700.0, 1850.0, 0.5);
        let y = line(ShapeKind::Lorentzian, &f, 1.0, -0.8, 1775.3, 5.0);
        let seed = f.iter().position(|&x| x >= 1775.0).unwrap();
        let est = fit_peak(&request(&f, &y, ShapeKind::Lorentzian, Polarity::Dip, seed));
        let fit = fitted(&est);
        assert!((fit.center - 1775.3).abs() < 1e-3, "{fit:?}");
        assert!((fit.width - 5.0).abs() < 1e-3, "{fit:?}");
        assert!(fit.amplitude < 0.0);
    }

    #[test]
    fn exhausted_iteration_budget_is_not_found() {
        let f = grid(1700.0, 1850.0, 0.5);
        let y = line(ShapeKind::Gaussian, &f, 0.2, 1.5, 1776.4, 4.0);
        let seed = f.iter().position(|&x| x >= 1772.0).unwrap();
        let req = PeakFitRequest {
            max_iterations: 1,
            ..request(&f, &y, ShapeKind::Gaussian, Polarity::Peak, seed)
        };
        match fit_peak(&req) {
            ResonanceEstimate::NotFound { reason } => {
                assert!(reason.contains("did not converge within 1 iterations"), "{reason}");
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn too_few_points_is_not_found() {
        let f = [1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 1.0, 1.0, 0.0];
        let est = fit_peak(&request(&f, &y, ShapeKind::Gaussian, Polarity::Peak, 1));
        assert!(!est.is_found());
    }

    #[test]
    fn flat_signal_is_not_found() {
        let f = grid(1700.0, 1710.0, 0.5);
        let y = vec![0.4; f.len()];
        let est = fit_peak(&request(&f, &y, ShapeKind::Gaussian, Polarity::Peak, 3));
        assert!(!est.is_found());
    }

    #[test]
    fn wrong_polarity_is_not_found() {
        let f = grid(1700.0, 1850.0, 0.5);
        let y = line(ShapeKind::Gaussian, &f, 0.0, 1.0, 1775.0, 4.0);
        let seed = f.iter().position(|&x| x >= 1775.0).unwrap();
        let est = fit_peak(&request(&f, &y, ShapeKind::Gaussian, Polarity::Dip, seed));
        assert!(!est.is_found());
    }

    #[test]
    fn width_grid_shrinks_from_range_to_step() {
        let f = grid(1700.0, 1850.0, 0.1);
        let widths = width_grid(&f, 150.0);
        assert_eq!(widths.len(), WIDTH_STEPS);
        assert!((widths[0] - 150.0).abs() < 1e-9);
        assert!((widths[WIDTH_STEPS - 1] - 0.4).abs() < 1e-9);
        assert!(widths.windows(2).all(|w| w[1] < w[0]));
    }
}
