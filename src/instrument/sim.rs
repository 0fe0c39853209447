//! Simulated source/digitizer pair.
//!
//! The two halves share the source state, so the digitizer "sees" whatever
//! frequency the source was last tuned to. The probe response is
//!
//! `baseline + sign * depth * shape((f - center) / width) + noise`
//!
//! with Gaussian noise of standard deviation `noise_fraction * depth` drawn
//! from a seeded RNG (reproducible runs). Replies can be corrupted with a
//! configurable probability to exercise the per-point failure path.

use std::cell::RefCell;
use std::rc::Rc;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Polarity, ShapeKind};
use crate::error::{AppError, EXIT_USAGE};
use crate::instrument::{Digitizer, InstrumentError, SignalSource};
use crate::models::shape_value;

/// Synthetic resonance and instrument behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchSettings {
    pub center_mhz: f64,
    /// Sigma (Gaussian) or HWHM (Lorentzian), MHz.
    pub width_mhz: f64,
    /// Feature height in signal units (> 0).
    pub depth: f64,
    pub baseline: f64,
    pub shape: ShapeKind,
    pub polarity: Polarity,
    /// Noise standard deviation relative to `depth`.
    pub noise_fraction: f64,
    /// Probability that a single reply is malformed.
    pub failure_probability: f64,
    pub seed: u64,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            center_mhz: 1775.3,
            width_mhz: 5.0,
            depth: 1.0,
            baseline: 0.0,
            shape: ShapeKind::Lorentzian,
            polarity: Polarity::Dip,
            noise_fraction: 0.01,
            failure_probability: 0.0,
            seed: 42,
        }
    }
}

impl BenchSettings {
    fn validate(&self) -> Result<(), AppError> {
        let finite = [self.center_mhz, self.width_mhz, self.depth, self.baseline, self.noise_fraction];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(AppError::new(EXIT_USAGE, "Simulation settings must be finite."));
        }
        if self.width_mhz <= 0.0 || self.depth <= 0.0 {
            return Err(AppError::new(EXIT_USAGE, "Simulated width and depth must be > 0."));
        }
        if self.noise_fraction < 0.0 {
            return Err(AppError::new(EXIT_USAGE, "Simulated noise fraction must be >= 0."));
        }
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(AppError::new(EXIT_USAGE, "Failure probability must be within [0, 1]."));
        }
        Ok(())
    }

    /// Noise-free probe response at `frequency` with the source output on.
    pub fn response(&self, frequency: f64) -> f64 {
        let g = shape_value(self.shape, frequency, self.center_mhz, self.width_mhz);
        self.baseline + self.polarity.sign() * self.depth * g
    }
}

#[derive(Debug)]
struct SourceState {
    frequency: f64,
    output_on: bool,
}

pub struct SimulatedSource {
    state: Rc<RefCell<SourceState>>,
    power_dbm: f64,
}

pub struct SimulatedDigitizer {
    state: Rc<RefCell<SourceState>>,
    settings: BenchSettings,
    rng: StdRng,
    noise: Normal<f64>,
    closed: bool,
}

/// A matched source + digitizer.
pub struct SimulatedBench {
    pub source: SimulatedSource,
    pub digitizer: SimulatedDigitizer,
}

impl SimulatedBench {
    pub fn new(settings: BenchSettings) -> Result<Self, AppError> {
        settings.validate()?;
        let noise = Normal::new(0.0, settings.noise_fraction * settings.depth)
            .map_err(|e| AppError::new(EXIT_USAGE, format!("Noise distribution error: {e}")))?;
        let state = Rc::new(RefCell::new(SourceState {
            frequency: 0.0,
            output_on: false,
        }));

        Ok(Self {
            source: SimulatedSource {
                state: Rc::clone(&state),
                power_dbm: 0.0,
            },
            digitizer: SimulatedDigitizer {
                state,
                rng: StdRng::seed_from_u64(settings.seed),
                settings,
                noise,
                closed: false,
            },
        })
    }
}

impl SimulatedSource {
    pub fn power_dbm(&self) -> f64 {
        self.power_dbm
    }

    pub fn output_on(&self) -> bool {
        self.state.borrow().output_on
    }
}

impl SignalSource for SimulatedSource {
    fn enable(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.state.borrow_mut().output_on = on;
        Ok(())
    }

    fn set_power(&mut self, dbm: f64) -> Result<(), InstrumentError> {
        self.power_dbm = dbm;
        Ok(())
    }

    fn set_frequency(&mut self, mhz: f64) -> Result<(), InstrumentError> {
        self.state.borrow_mut().frequency = mhz;
        Ok(())
    }
}

impl SimulatedDigitizer {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), InstrumentError> {
        if self.closed {
            Err(InstrumentError::connection("simulated digitizer", "connection closed"))
        } else {
            Ok(())
        }
    }
}

impl Digitizer for SimulatedDigitizer {
    fn trigger_acquisition(&mut self) -> Result<(), InstrumentError> {
        self.ensure_open()
    }

    fn read_channel_sample(&mut self, _channel: u8) -> Result<f64, InstrumentError> {
        self.ensure_open()?;
        if self.settings.failure_probability > 0.0 && self.rng.gen_bool(self.settings.failure_probability) {
            return Err(InstrumentError::parse("{0.0,ERR!}", "simulated corrupted reply"));
        }

        let (frequency, output_on) = {
            let state = self.state.borrow();
            (state.frequency, state.output_on)
        };
        let clean = if output_on {
            self.settings.response(frequency)
        } else {
            self.settings.baseline
        };
        Ok(clean + self.noise.sample(&mut self.rng))
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digitizer_follows_source_frequency() {
        let settings = BenchSettings {
            noise_fraction: 0.0,
            ..BenchSettings::default()
        };
        let mut bench = SimulatedBench::new(settings.clone()).unwrap();
        bench.source.enable(true).unwrap();

        bench.source.set_frequency(settings.center_mhz).unwrap();
        let at_center = bench.digitizer.read_channel_sample(2).unwrap();
        assert!((at_center - (settings.baseline - settings.depth)).abs() < 1e-12);

        bench.source.set_frequency(settings.center_mhz + 100.0).unwrap();
        let far = bench.digitizer.read_channel_sample(2).unwrap();
        assert!(far > at_center);
    }

    #[test]
    fn closed_digitizer_reports_connection_loss() {
        let mut bench = SimulatedBench::new(BenchSettings::default()).unwrap();
        bench.digitizer.close().unwrap();
        assert!(bench.digitizer.is_closed());
        let err = bench.digitizer.read_channel_sample(2).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn sweep_leaves_bench_torn_down() {
        use std::time::Duration;

        use crate::domain::{GridSpec, SweepConfig};
        use crate::sweep::{NullObserver, SweepController};

        let config = SweepConfig {
            grid: GridSpec {
                min_mhz: 1775.0,
                max_mhz: 1776.0,
                ..GridSpec::default()
            },
            power_dbm: -3.5,
            settle_delay: Duration::ZERO,
            ..SweepConfig::default()
        };
        let mut bench = SimulatedBench::new(BenchSettings::default()).unwrap();
        let controller = SweepController::new(config).unwrap();
        let result = controller
            .run(&mut bench.source, &mut bench.digitizer, &mut NullObserver)
            .unwrap();

        assert_eq!(result.success_count(), 11);
        assert_eq!(bench.source.power_dbm(), -3.5);
        assert!(!bench.source.output_on());
        assert!(bench.digitizer.is_closed());
    }

    #[test]
    fn certain_failure_is_recoverable() {
        let settings = BenchSettings {
            failure_probability: 1.0,
            ..BenchSettings::default()
        };
        let mut bench = SimulatedBench::new(settings).unwrap();
        let err = bench.digitizer.read_channel_sample(2).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = BenchSettings {
            failure_probability: 1.5,
            ..BenchSettings::default()
        };
        assert!(SimulatedBench::new(settings).is_err());
    }
}
