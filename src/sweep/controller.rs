//! The acquisition loop.
//!
//! ```text
//! init:     source.enable(true), source.set_power(p)
//! per f:    source.set_frequency(f), settle,
//!           averages × (trigger, read) -> mean | failed
//! teardown: source.enable(false) if enabled, digitizer.close()
//! ```
//!
//! Teardown lives in a drop guard, so it runs exactly once whether the sweep
//! completes, aborts on a fatal instrument error, or unwinds.

use std::thread;
use std::time::Instant;

use chrono::Local;
use log::{debug, warn};
use thiserror::Error;

use crate::domain::{ConfigError, PointOutcome, SweepConfig, SweepPoint, SweepResult};
use crate::instrument::{Digitizer, InstrumentError, SignalSource};
use crate::sweep::grid::{FrequencyGrid, GridError};
use crate::sweep::observer::{PointProgress, SweepObserver, TimeEstimate};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("instrument failure{}: {source}", at_frequency(.frequency))]
    Instrument {
        /// Grid point being measured, `None` during initialization.
        frequency: Option<f64>,
        source: InstrumentError,
    },
}

fn at_frequency(frequency: &Option<f64>) -> String {
    frequency.map(|f| format!(" at {f} MHz")).unwrap_or_default()
}

/// Validated sweep settings plus the grid they produce.
#[derive(Debug, Clone)]
pub struct SweepController {
    config: SweepConfig,
    grid: FrequencyGrid,
}

impl SweepController {
    pub fn new(config: SweepConfig) -> Result<Self, SweepError> {
        config.validate()?;
        let grid = FrequencyGrid::from_spec(&config.grid)?;
        Ok(Self { config, grid })
    }

    /// Sweep an explicit grid instead of the one described by `config.grid`.
    pub fn with_grid(config: SweepConfig, grid: FrequencyGrid) -> Result<Self, SweepError> {
        config.validate()?;
        Ok(Self { config, grid })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    /// Visit every grid frequency once, in order.
    ///
    /// Recoverable instrument errors fail only the point being measured.
    /// Anything else aborts the sweep with `SweepError::Instrument`; the
    /// instruments are torn down in both cases.
    pub fn run<S, D>(
        &self,
        source: &mut S,
        digitizer: &mut D,
        observer: &mut dyn SweepObserver,
    ) -> Result<SweepResult, SweepError>
    where
        S: SignalSource + ?Sized,
        D: Digitizer + ?Sized,
    {
        let started_at = Local::now();
        let total = self.grid.len();
        let mut bench = Teardown {
            source,
            digitizer,
            source_enabled: false,
        };

        observer.on_start(total);

        if total > 0 {
            let init = |e| SweepError::Instrument {
                frequency: None,
                source: e,
            };
            bench.source.enable(true).map_err(init)?;
            bench.source_enabled = true;
            bench.source.set_power(self.config.power_dbm).map_err(init)?;
        }

        let clock = Instant::now();
        let eta_at = self.eta_point(total);
        let mut points = Vec::with_capacity(total);

        for (i, frequency) in self.grid.iter().enumerate() {
            let outcome = match self.measure(&mut bench, frequency) {
                Ok(signal) => PointOutcome::Averaged { signal },
                Err(e) if e.is_recoverable() => PointOutcome::Failed {
                    reason: e.to_string(),
                },
                Err(e) => {
                    return Err(SweepError::Instrument {
                        frequency: Some(frequency),
                        source: e,
                    });
                }
            };

            let done = i + 1;
            observer.on_point(&PointProgress {
                index: done,
                total,
                frequency,
                signal: match outcome {
                    PointOutcome::Averaged { signal } => Some(signal),
                    PointOutcome::Failed { .. } => None,
                },
                failure: match &outcome {
                    PointOutcome::Failed { reason } => Some(reason.clone()),
                    PointOutcome::Averaged { .. } => None,
                },
            });
            points.push(SweepPoint { frequency, outcome });

            if Some(done) == eta_at {
                if let Some(estimate) = TimeEstimate::from_elapsed(clock.elapsed(), done, total, Local::now()) {
                    observer.on_estimate(&estimate);
                }
            }
        }

        let result = SweepResult {
            points,
            started_at,
            finished_at: Local::now(),
        };
        observer.on_complete(&result);
        Ok(result)
    }

    /// Point count after which the time estimate is reported, if at all.
    fn eta_point(&self, total: usize) -> Option<usize> {
        let after = self.config.eta_after_points;
        (total > 1 && after > 0 && after < total).then_some(after)
    }

    /// Tune, settle, then average `averages` samples. The first failing
    /// sample abandons the point.
    fn measure<S, D>(&self, bench: &mut Teardown<'_, S, D>, frequency: f64) -> Result<f64, InstrumentError>
    where
        S: SignalSource + ?Sized,
        D: Digitizer + ?Sized,
    {
        bench.source.set_frequency(frequency)?;
        if !self.config.settle_delay.is_zero() {
            thread::sleep(self.config.settle_delay);
        }

        let mut sum = 0.0;
        for _ in 0..self.config.averages {
            bench.digitizer.trigger_acquisition()?;
            sum += bench.digitizer.read_channel_sample(self.config.probe_channel)?;
        }
        let mean = sum / self.config.averages as f64;
        debug!("{frequency:.4} MHz: mean of {} samples = {mean}", self.config.averages);
        Ok(mean)
    }
}

/// Borrowed instruments, shut down when dropped.
struct Teardown<'a, S: SignalSource + ?Sized, D: Digitizer + ?Sized> {
    source: &'a mut S,
    digitizer: &'a mut D,
    source_enabled: bool,
}

impl<S: SignalSource + ?Sized, D: Digitizer + ?Sized> Drop for Teardown<'_, S, D> {
    fn drop(&mut self) {
        if self.source_enabled {
            if let Err(e) = self.source.enable(false) {
                warn!("Failed to disable source output: {e}");
            }
        }
        if let Err(e) = self.digitizer.close() {
            warn!("Failed to close digitizer: {e}");
        }
    }
}
