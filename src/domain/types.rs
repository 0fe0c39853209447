//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by the sweep controller
//! - exported to JSON/CSV
//! - reloaded later for analysis

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ShapeKind;

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PointOutcome {
    /// Mean of exactly `averages` samples.
    Averaged { signal: f64 },
    /// At least one sample failed; nothing was averaged.
    Failed { reason: String },
}

/// One recorded grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub frequency: f64,
    pub outcome: PointOutcome,
}

impl SweepPoint {
    pub fn averaged_signal(&self) -> Option<f64> {
        match self.outcome {
            PointOutcome::Averaged { signal } => Some(signal),
            PointOutcome::Failed { .. } => None,
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self.outcome, PointOutcome::Failed { .. })
    }
}

/// Output of one full sweep.
///
/// `points` holds one entry per grid frequency, in grid order. Successful
/// points and failed frequencies are views over it, so together they always
/// cover the grid exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub points: Vec<SweepPoint>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl SweepResult {
    pub fn grid_len(&self) -> usize {
        self.points.len()
    }

    /// Successful `(frequency, signal)` pairs in grid order.
    pub fn successful(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.averaged_signal().map(|s| (p.frequency, s)))
    }

    pub fn success_count(&self) -> usize {
        self.points.iter().filter(|p| !p.failed()).count()
    }

    pub fn failed_frequencies(&self) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| p.failed())
            .map(|p| p.frequency)
            .collect()
    }

    /// Convert the successful points into an estimator input.
    ///
    /// Fails with `TraceError::Empty` when every point failed.
    pub fn to_trace(&self) -> Result<Trace, TraceError> {
        Trace::from_pairs(self.successful())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    #[error("trace has no points")]
    Empty,
    #[error("frequency/signal length mismatch: {frequencies} vs {signal}")]
    LengthMismatch { frequencies: usize, signal: usize },
    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("frequencies not strictly increasing at index {index} ({previous} -> {current})")]
    NotIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },
}

/// Estimator input: `(frequency, signal)` pairs with strictly increasing frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    frequencies: Vec<f64>,
    signal: Vec<f64>,
}

impl Trace {
    pub fn new(frequencies: Vec<f64>, signal: Vec<f64>) -> Result<Self, TraceError> {
        if frequencies.len() != signal.len() {
            return Err(TraceError::LengthMismatch {
                frequencies: frequencies.len(),
                signal: signal.len(),
            });
        }
        if frequencies.is_empty() {
            return Err(TraceError::Empty);
        }
        for (index, (f, s)) in frequencies.iter().zip(signal.iter()).enumerate() {
            if !(f.is_finite() && s.is_finite()) {
                return Err(TraceError::NonFinite { index });
            }
        }
        for (index, pair) in frequencies.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(TraceError::NotIncreasing {
                    index: index + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }
        Ok(Self { frequencies, signal })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, TraceError> {
        let (frequencies, signal) = pairs.into_iter().unzip();
        Self::new(frequencies, signal)
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Always false: a `Trace` holds at least one point.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn signal(&self) -> &[f64] {
        &self.signal
    }

    pub fn first_frequency(&self) -> f64 {
        self.frequencies[0]
    }

    pub fn last_frequency(&self) -> f64 {
        self.frequencies[self.frequencies.len() - 1]
    }

    /// Frequency span (0 for a single point).
    pub fn span(&self) -> f64 {
        self.last_frequency() - self.first_frequency()
    }
}

/// The three estimation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    Extremum,
    PeakFit,
    PeakDetection,
}

impl EstimateMethod {
    pub const ALL: [EstimateMethod; 3] = [
        EstimateMethod::Extremum,
        EstimateMethod::PeakFit,
        EstimateMethod::PeakDetection,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            EstimateMethod::Extremum => "Extremum",
            EstimateMethod::PeakFit => "Peak fit",
            EstimateMethod::PeakDetection => "Peak detection",
        }
    }
}

/// Parameters of a converged line-shape fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakFit {
    pub shape: ShapeKind,
    pub center: f64,
    /// Sigma for Gaussian, half width at half maximum for Lorentzian.
    pub width: f64,
    pub amplitude: f64,
    pub offset: f64,
    pub rmse: f64,
    pub iterations: usize,
}

/// Method-specific information attached to a found resonance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EstimateDetail {
    Extremum {
        index: usize,
        signal: f64,
    },
    PeakFit(PeakFit),
    PeakDetection {
        index: usize,
        prominence: f64,
        threshold: f64,
        /// Extrema that survived spacing + prominence filtering.
        candidates: usize,
    },
}

/// Result of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResonanceEstimate {
    Found { frequency: f64, detail: EstimateDetail },
    NotFound { reason: String },
}

impl ResonanceEstimate {
    pub fn not_found(reason: impl Into<String>) -> Self {
        ResonanceEstimate::NotFound {
            reason: reason.into(),
        }
    }

    pub fn frequency(&self) -> Option<f64> {
        match self {
            ResonanceEstimate::Found { frequency, .. } => Some(*frequency),
            ResonanceEstimate::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.frequency().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_rejects_empty_and_unordered_input() {
        assert_eq!(Trace::new(vec![], vec![]), Err(TraceError::Empty));
        assert!(matches!(
            Trace::new(vec![1.0, 1.0], vec![0.0, 0.0]),
            Err(TraceError::NotIncreasing { index: 1, .. })
        ));
        assert!(matches!(
            Trace::new(vec![1.0, 2.0], vec![0.0]),
            Err(TraceError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Trace::new(vec![1.0, 2.0], vec![0.0, f64::NAN]),
            Err(TraceError::NonFinite { index: 1 })
        ));
    }

    #[test]
    fn sweep_result_views_partition_the_grid() {
        let now = Local::now();
        let result = SweepResult {
            points: vec![
                SweepPoint { frequency: 1.0, outcome: PointOutcome::Averaged { signal: 0.5 } },
                SweepPoint { frequency: 2.0, outcome: PointOutcome::Failed { reason: "bad".into() } },
                SweepPoint { frequency: 3.0, outcome: PointOutcome::Averaged { signal: 0.7 } },
            ],
            started_at: now,
            finished_at: now,
        };

        let ok: Vec<(f64, f64)> = result.successful().collect();
        assert_eq!(ok, vec![(1.0, 0.5), (3.0, 0.7)]);
        assert_eq!(result.failed_frequencies(), vec![2.0]);

        let trace = result.to_trace().unwrap();
        assert_eq!(trace.frequencies(), &[1.0, 3.0]);
        assert_eq!(trace.span(), 2.0);
    }
}
