//! Resonance estimation.
//!
//! One analysis preprocesses the trace once (baseline, smoothing) and runs
//! the three methods on the result:
//!
//! - A: global extremum of the smoothed signal
//! - B: line-shape fit seeded at A
//! - C: most prominent extremum after spacing and prominence filtering
//!
//! Each method fails independently: a method that cannot produce an estimate
//! reports `NotFound` with a reason and the others are unaffected.

pub mod extremum;
pub mod fitter;
pub mod peaks;
pub mod preprocess;

use log::{debug, info, warn};

use crate::domain::{
    ConfigError, EstimateMethod, EstimatorConfig, Polarity, ResonanceEstimate, ShapeKind, SweepResult, Trace,
};
use crate::math::{Polynomial, diff_noise_sigma};

pub use extremum::{extremum_index, find_extremum};
pub use fitter::{MIN_FIT_POINTS, PeakFitRequest, fit_peak};
pub use peaks::{DetectionSettings, MIN_DETECTION_POINTS, detect_peak};
pub use preprocess::{Preprocessed, preprocess};

/// Output of one analysis: the three estimates plus the intermediate signals
/// needed to plot or export them.
#[derive(Debug, Clone)]
pub struct ResonanceReport {
    pub polarity: Polarity,
    pub shape: ShapeKind,
    pub extremum: ResonanceEstimate,
    pub peak_fit: ResonanceEstimate,
    pub peak_detection: ResonanceEstimate,
    /// Smoothed, baseline-corrected signal (one value per trace point).
    pub smoothed: Vec<f64>,
    pub baseline: Option<Polynomial>,
    /// Savitzky–Golay window actually applied, `None` if smoothing was skipped.
    pub smoothing_window: Option<usize>,
    /// Robust noise estimate of the corrected signal.
    pub noise_sigma: f64,
}

impl ResonanceReport {
    pub fn estimate(&self, method: EstimateMethod) -> &ResonanceEstimate {
        match method {
            EstimateMethod::Extremum => &self.extremum,
            EstimateMethod::PeakFit => &self.peak_fit,
            EstimateMethod::PeakDetection => &self.peak_detection,
        }
    }

    pub fn estimates(&self) -> impl Iterator<Item = (EstimateMethod, &ResonanceEstimate)> + '_ {
        EstimateMethod::ALL.into_iter().map(|m| (m, self.estimate(m)))
    }

    pub fn found_count(&self) -> usize {
        self.estimates().filter(|(_, e)| e.is_found()).count()
    }

    /// Smoothed signal on the raw scale (baseline added back) for overlays.
    pub fn smoothed_on_raw_scale(&self, frequencies: &[f64]) -> Vec<f64> {
        match &self.baseline {
            Some(poly) => frequencies
                .iter()
                .zip(&self.smoothed)
                .map(|(&f, &s)| s + poly.eval(f))
                .collect(),
            None => self.smoothed.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResonanceEstimator {
    config: EstimatorConfig,
}

impl ResonanceEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Run all three methods on `trace`. Never fails; per-method problems are
    /// reported as `NotFound`.
    pub fn analyze(&self, trace: &Trace) -> ResonanceReport {
        let config = &self.config;
        let shape = config.shape_kind();
        let frequencies = trace.frequencies();

        let pre = preprocess(trace, config);
        let noise_sigma = diff_noise_sigma(&pre.corrected);
        debug!(
            "Preprocessed {} points: window={:?}, baseline degree={:?}, noise sigma={noise_sigma:.4e}",
            trace.len(),
            pre.window,
            pre.baseline.as_ref().map(Polynomial::degree)
        );

        let extremum = find_extremum(frequencies, &pre.smoothed, config.polarity);

        let seed_index = extremum_index(&pre.smoothed, config.polarity).unwrap_or(0);
        let peak_fit = fit_peak(&PeakFitRequest {
            frequencies,
            signal: &pre.smoothed,
            shape,
            polarity: config.polarity,
            seed_index,
            max_iterations: config.max_fit_iterations,
        });

        let detection = DetectionSettings {
            distance: ((trace.len() as f64 * config.peak_spacing_fraction).floor() as usize).max(1),
            threshold: config.min_prominence.max(config.prominence_sigma * noise_sigma),
        };
        let peak_detection = detect_peak(frequencies, &pre.smoothed, config.polarity, detection);

        let report = ResonanceReport {
            polarity: config.polarity,
            shape,
            extremum,
            peak_fit,
            peak_detection,
            smoothed: pre.smoothed,
            baseline: pre.baseline,
            smoothing_window: pre.window,
            noise_sigma,
        };
        for (method, estimate) in report.estimates() {
            match estimate {
                ResonanceEstimate::Found { frequency, .. } => {
                    info!("{}: {frequency:.4} MHz", method.display_name())
                }
                ResonanceEstimate::NotFound { reason } => {
                    warn!("{}: no estimate ({reason})", method.display_name())
                }
            }
        }
        report
    }

    /// Analyze the successful points of a sweep. Returns `None` when the
    /// sweep produced no usable data, so there is nothing to analyze.
    pub fn analyze_sweep(&self, sweep: &SweepResult) -> Option<ResonanceReport> {
        match sweep.to_trace() {
            Ok(trace) => Some(self.analyze(&trace)),
            Err(e) => {
                warn!("Analysis declined: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Local;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    use super::*;
    use crate::domain::{EstimateDetail, PeakShape, PointOutcome, SweepPoint};
    use crate::models::shape_value;

    fn frequencies(min: f64, max: f64, step: f64) -> Vec<f64> {
        let n = ((max - min) / step).round() as usize + 1;
        (0..n).map(|i| min + i as f64 * step).collect()
    }

    fn noisy_dip(seed: u64) -> Trace {
        let f = frequencies(1700.0, 1850.0, 0.1);
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.01).unwrap();
        let y = f
            .iter()
            .map(|&x| 0.5 - shape_value(ShapeKind::Lorentzian, x, 1775.3, 5.0) + noise.sample(&mut rng))
            .collect();
        Trace::new(f, y).unwrap()
    }

    fn dip_config() -> EstimatorConfig {
        EstimatorConfig {
            polarity: Polarity::Dip,
            ..EstimatorConfig::default()
        }
    }

    #[test]
    fn all_methods_agree_on_a_noisy_dip() {
        let estimator = ResonanceEstimator::new(dip_config()).unwrap();
        let report = estimator.analyze(&noisy_dip(7));
        assert_eq!(report.shape, ShapeKind::Lorentzian);
        assert_eq!(report.smoothing_window, Some(51));
        for (method, estimate) in report.estimates() {
            let f = estimate.frequency().unwrap_or_else(|| panic!("{method:?}: {estimate:?}"));
            assert!((f - 1775.3).abs() < 0.5, "{method:?} -> {f}");
        }
    }

    #[test]
    fn fit_budget_exhaustion_leaves_other_methods_intact() {
        let config = EstimatorConfig {
            max_fit_iterations: 1,
            ..dip_config()
        };
        let report = ResonanceEstimator::new(config).unwrap().analyze(&noisy_dip(7));
        match &report.peak_fit {
            ResonanceEstimate::NotFound { reason } => assert!(reason.contains("did not converge"), "{reason}"),
            other => panic!("expected not found, got {other:?}"),
        }
        for estimate in [&report.extremum, &report.peak_detection] {
            let f = estimate.frequency().unwrap_or_else(|| panic!("{estimate:?}"));
            assert!((f - 1775.3).abs() < 0.5, "{f}");
        }
    }

    #[test]
    fn extremum_is_idempotent() {
        let estimator = ResonanceEstimator::new(dip_config()).unwrap();
        let trace = noisy_dip(11);
        let a = estimator.analyze(&trace);
        let b = estimator.analyze(&trace);
        assert_eq!(a.extremum, b.extremum);
        assert_eq!(a.peak_detection, b.peak_detection);
    }

    #[test]
    fn flat_trace_has_no_fit_or_detection() {
        let f = frequencies(1700.0, 1710.0, 0.1);
        let trace = Trace::new(f.clone(), vec![1.0; f.len()]).unwrap();
        let estimator = ResonanceEstimator::new(EstimatorConfig::default()).unwrap();
        let report = estimator.analyze(&trace);
        assert!(report.extremum.is_found());
        assert!(!report.peak_fit.is_found());
        assert!(!report.peak_detection.is_found());
        assert_eq!(report.found_count(), 1);
    }

    #[test]
    fn tiny_trace_degrades_gracefully() {
        let trace = Trace::new(vec![1.0, 2.0], vec![0.0, 1.0]).unwrap();
        let estimator = ResonanceEstimator::new(EstimatorConfig::default()).unwrap();
        let report = estimator.analyze(&trace);
        assert_eq!(report.smoothing_window, None);
        assert_eq!(report.extremum.frequency(), Some(2.0));
        assert!(!report.peak_fit.is_found());
        assert!(!report.peak_detection.is_found());
    }

    #[test]
    fn explicit_shape_overrides_auto() {
        let config = EstimatorConfig {
            shape: PeakShape::Gaussian,
            ..dip_config()
        };
        let report = ResonanceEstimator::new(config).unwrap().analyze(&noisy_dip(3));
        assert_eq!(report.shape, ShapeKind::Gaussian);
        if let ResonanceEstimate::Found {
            detail: EstimateDetail::PeakFit(fit),
            ..
        } = &report.peak_fit
        {
            assert_eq!(fit.shape, ShapeKind::Gaussian);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EstimatorConfig {
            max_fit_iterations: 0,
            ..EstimatorConfig::default()
        };
        assert_eq!(
            ResonanceEstimator::new(config).unwrap_err(),
            ConfigError::ZeroIterations
        );
    }

    #[test]
    fn sweep_without_successes_is_declined() {
        let now = Local::now();
        let sweep = SweepResult {
            points: vec![SweepPoint {
                frequency: 1700.0,
                outcome: PointOutcome::Failed {
                    reason: "timeout".into(),
                },
            }],
            started_at: now,
            finished_at: now,
        };
        let estimator = ResonanceEstimator::new(EstimatorConfig::default()).unwrap();
        assert!(estimator.analyze_sweep(&sweep).is_none());
    }
}
