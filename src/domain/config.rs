//! Immutable run configuration.
//!
//! Both the sweep controller and the estimator receive one of these values at
//! construction time. They are built from CLI flags (see `app::sweep_config_from_args`)
//! and never mutated afterwards.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the resonance shows up as a maximum or a minimum of the probe signal.
///
/// There is no reliable way to infer this from the data alone (a noisy trace
/// has both), so it is always an explicit choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Emission-type resonance: the feature is a maximum.
    Peak,
    /// Absorption-type resonance: the feature is a minimum.
    Dip,
}

impl Polarity {
    /// Multiplier that turns the feature of interest into a maximum.
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Peak => 1.0,
            Polarity::Dip => -1.0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Polarity::Peak => "maximum",
            Polarity::Dip => "minimum",
        }
    }
}

/// Which line shape the parametric fit uses.
///
/// `Auto` means: Gaussian for `Peak`, Lorentzian for `Dip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeakShape {
    Auto,
    Gaussian,
    Lorentzian,
}

/// Concrete line shape after resolving `PeakShape::Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Gaussian,
    Lorentzian,
}

impl PeakShape {
    pub fn resolve(self, polarity: Polarity) -> ShapeKind {
        match (self, polarity) {
            (PeakShape::Gaussian, _) => ShapeKind::Gaussian,
            (PeakShape::Lorentzian, _) => ShapeKind::Lorentzian,
            (PeakShape::Auto, Polarity::Peak) => ShapeKind::Gaussian,
            (PeakShape::Auto, Polarity::Dip) => ShapeKind::Lorentzian,
        }
    }
}

impl ShapeKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ShapeKind::Gaussian => "Gaussian",
            ShapeKind::Lorentzian => "Lorentzian",
        }
    }

    /// What the fitted `width` parameter means for this shape.
    pub fn width_label(self) -> &'static str {
        match self {
            ShapeKind::Gaussian => "sigma",
            ShapeKind::Lorentzian => "hwhm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("averages must be >= 1")]
    ZeroAverages,
    #[error("source power must be finite, got {0}")]
    InvalidPower(f64),
    #[error("smoothing window must be odd and >= 3, got {0}")]
    InvalidWindow(usize),
    #[error("smoothing polyorder {polyorder} must be < window {window}")]
    PolyorderTooLarge { polyorder: usize, window: usize },
    #[error("baseline degree must be <= {max}, got {degree}")]
    BaselineDegree { degree: usize, max: usize },
    #[error("fit iteration budget must be >= 1")]
    ZeroIterations,
    #[error("peak spacing fraction must be in (0, 1], got {0}")]
    InvalidSpacing(f64),
    #[error("prominence settings must be finite and >= 0 (min={min}, sigma={sigma})")]
    InvalidProminence { min: f64, sigma: f64 },
}

/// Frequency grid parameters (MHz).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub min_mhz: f64,
    pub max_mhz: f64,
    pub step_mhz: f64,
    /// Round every grid value to this many decimal places.
    pub decimals: Option<u32>,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            min_mhz: 1700.0,
            max_mhz: 1850.0,
            step_mhz: 0.1,
            decimals: Some(1),
        }
    }
}

/// Everything the sweep controller needs besides the instruments themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub grid: GridSpec,
    /// Source output power (dBm).
    pub power_dbm: f64,
    /// Samples averaged per grid point.
    pub averages: usize,
    /// Digitizer channel carrying the probe signal.
    pub probe_channel: u8,
    /// Wait after each frequency command before sampling.
    pub settle_delay: Duration,
    /// Report the time estimate after this many completed points (0 disables).
    pub eta_after_points: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            power_dbm: 10.0,
            averages: 5,
            probe_channel: 2,
            settle_delay: Duration::from_millis(100),
            eta_after_points: 10,
        }
    }
}

impl SweepConfig {
    /// Reject settings that make no sense before any instrument is touched.
    ///
    /// Grid parameters are validated separately when the grid is generated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.averages == 0 {
            return Err(ConfigError::ZeroAverages);
        }
        if !self.power_dbm.is_finite() {
            return Err(ConfigError::InvalidPower(self.power_dbm));
        }
        Ok(())
    }
}

/// Savitzky–Golay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Window length in samples (odd).
    pub window: usize,
    /// Local polynomial order (< window).
    pub polyorder: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 51,
            polyorder: 3,
        }
    }
}

/// Highest polynomial degree accepted for baseline removal.
pub const MAX_BASELINE_DEGREE: usize = 5;

/// Estimator settings shared by preprocessing and all three methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub polarity: Polarity,
    pub shape: PeakShape,
    /// Polynomial degree of the baseline to subtract (`None` = no correction).
    pub baseline_degree: Option<usize>,
    /// `None` disables smoothing entirely.
    pub smoothing: Option<SmoothingConfig>,
    /// Iteration cap for the nonlinear peak fit.
    pub max_fit_iterations: usize,
    /// Minimum spacing between detected extrema, as a fraction of trace length.
    pub peak_spacing_fraction: f64,
    /// Absolute prominence floor (signal units).
    pub min_prominence: f64,
    /// Prominence floor in multiples of the estimated noise level.
    pub prominence_sigma: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            polarity: Polarity::Peak,
            shape: PeakShape::Auto,
            baseline_degree: None,
            smoothing: Some(SmoothingConfig::default()),
            max_fit_iterations: 200,
            peak_spacing_fraction: 0.1,
            min_prominence: 0.0,
            prominence_sigma: 5.0,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(s) = self.smoothing {
            if s.window < 3 || s.window % 2 == 0 {
                return Err(ConfigError::InvalidWindow(s.window));
            }
            if s.polyorder >= s.window {
                return Err(ConfigError::PolyorderTooLarge {
                    polyorder: s.polyorder,
                    window: s.window,
                });
            }
        }
        if let Some(degree) = self.baseline_degree {
            if degree > MAX_BASELINE_DEGREE {
                return Err(ConfigError::BaselineDegree {
                    degree,
                    max: MAX_BASELINE_DEGREE,
                });
            }
        }
        if self.max_fit_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if !(self.peak_spacing_fraction.is_finite()
            && self.peak_spacing_fraction > 0.0
            && self.peak_spacing_fraction <= 1.0)
        {
            return Err(ConfigError::InvalidSpacing(self.peak_spacing_fraction));
        }
        let prominence_ok = |v: f64| v.is_finite() && v >= 0.0;
        if !(prominence_ok(self.min_prominence) && prominence_ok(self.prominence_sigma)) {
            return Err(ConfigError::InvalidProminence {
                min: self.min_prominence,
                sigma: self.prominence_sigma,
            });
        }
        Ok(())
    }

    pub fn shape_kind(&self) -> ShapeKind {
        self.shape.resolve(self.polarity)
    }
}
