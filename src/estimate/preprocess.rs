//! Shared preprocessing: optional baseline removal, then Savitzky–Golay smoothing.

use log::debug;

use crate::domain::{EstimatorConfig, Trace};
use crate::math::{Polynomial, polyfit, savgol_filter};

/// Signals derived once per analysis and shared by all methods.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Raw signal minus the baseline (the raw signal when correction is off).
    pub corrected: Vec<f64>,
    /// Smoothed `corrected` (equal to it when smoothing was skipped).
    pub smoothed: Vec<f64>,
    pub baseline: Option<Polynomial>,
    /// Window actually used, `None` when smoothing was skipped.
    pub window: Option<usize>,
}

pub fn preprocess(trace: &Trace, config: &EstimatorConfig) -> Preprocessed {
    let f = trace.frequencies();
    let raw = trace.signal();

    let baseline = config.baseline_degree.and_then(|degree| polyfit(f, raw, degree));
    let corrected: Vec<f64> = match &baseline {
        Some(poly) => f.iter().zip(raw).map(|(&x, &y)| y - poly.eval(x)).collect(),
        None => raw.to_vec(),
    };

    let mut window = None;
    let mut smoothed = corrected.clone();
    if let Some(s) = config.smoothing {
        match effective_window(s.window, s.polyorder, corrected.len()) {
            Some(w) => {
                if let Some(out) = savgol_filter(&corrected, w, s.polyorder) {
                    smoothed = out;
                    window = Some(w);
                }
            }
            None => debug!(
                "Trace of {} points is too short for polyorder {}; smoothing skipped",
                corrected.len(),
                s.polyorder
            ),
        }
    }

    Preprocessed {
        corrected,
        smoothed,
        baseline,
        window,
    }
}

/// Largest odd window ≤ both the configured window and the trace length, or
/// `None` if that leaves no room for the polynomial.
fn effective_window(window: usize, polyorder: usize, len: usize) -> Option<usize> {
    let mut w = window.min(len);
    if w % 2 == 0 {
        w = w.saturating_sub(1);
    }
    (w >= 3 && w > polyorder).then_some(w)
}
