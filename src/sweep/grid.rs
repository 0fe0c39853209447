//! Frequency grid generation.
//!
//! Values are computed as `min + i * step` (never by accumulating `step`), so
//! floating-point error does not grow along the sweep. `max` is included when
//! it lies on a step boundary within `STEP_TOLERANCE` steps.

use thiserror::Error;

use crate::domain::GridSpec;

/// Fraction of a step within which `max` still counts as on-grid.
const STEP_TOLERANCE: f64 = 1e-9;
/// Upper bound on grid length, checked before anything is allocated.
pub const MAX_GRID_POINTS: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid bounds must be finite (min={min}, max={max}, step={step})")]
    NonFinite { min: f64, max: f64, step: f64 },
    #[error("step must be > 0, got {0}")]
    NonPositiveStep(f64),
    #[error("max ({max}) is below min ({min})")]
    Inverted { min: f64, max: f64 },
    #[error("rounding to {decimals} decimals merges {previous} and {current}; use a larger step or more decimals")]
    RoundingCollision {
        decimals: u32,
        previous: f64,
        current: f64,
    },
    #[error("grid would have {count} points, more than the limit of {max}")]
    TooManyPoints { count: f64, max: usize },
}

/// Strictly increasing sweep frequencies (MHz).
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    values: Vec<f64>,
}

impl FrequencyGrid {
    pub fn from_spec(spec: &GridSpec) -> Result<Self, GridError> {
        Self::generate(spec.min_mhz, spec.max_mhz, spec.step_mhz, spec.decimals)
    }

    pub fn generate(min: f64, max: f64, step: f64, decimals: Option<u32>) -> Result<Self, GridError> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(GridError::NonFinite { min, max, step });
        }
        if step <= 0.0 {
            return Err(GridError::NonPositiveStep(step));
        }
        if max < min {
            return Err(GridError::Inverted { min, max });
        }

        let count = ((max - min) / step + STEP_TOLERANCE).floor() + 1.0;
        if count >= 2.0 {
            if let Some(d) = decimals {
                let (first, second) = (round_to(min, d), round_to(min + step, d));
                if second <= first {
                    return Err(GridError::RoundingCollision {
                        decimals: d,
                        previous: first,
                        current: second,
                    });
                }
            }
        }
        if count > MAX_GRID_POINTS as f64 {
            return Err(GridError::TooManyPoints {
                count,
                max: MAX_GRID_POINTS,
            });
        }
        let count = count as usize;
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let raw = min + i as f64 * step;
            let value = match decimals {
                Some(d) => round_to(raw, d),
                None => raw,
            };
            if let Some(&previous) = values.last() {
                if value <= previous {
                    return Err(GridError::RoundingCollision {
                        decimals: decimals.unwrap_or(0),
                        previous,
                        current: value,
                    });
                }
            }
            values.push(value);
        }

        Ok(Self { values })
    }

    /// Wrap an explicit list of frequencies (must be strictly increasing).
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        let ordered = values.iter().all(|v| v.is_finite()) && values.windows(2).all(|w| w[1] > w[0]);
        ordered.then_some(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
