//! The acquire -> persist -> analyze workflow shared by `acquire` and
//! `simulate`.
//!
//! Front-ends pick the instruments and the observer; this module runs the
//! sweep, writes the run files and hands the result to the estimator.

use std::path::{Path, PathBuf};

use crate::domain::{EstimatorConfig, SweepConfig, SweepResult, Trace};
use crate::error::AppError;
use crate::estimate::{ResonanceEstimator, ResonanceReport};
use crate::instrument::{BenchSettings, Digitizer, SignalSource, SimulatedBench};
use crate::io::{RunRecord, write_run_json, write_trace_csv};
use crate::sweep::{NullObserver, SweepController, SweepObserver};

/// Estimator output for a finished sweep.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub trace: Trace,
    pub report: ResonanceReport,
}

/// All computed outputs of one sweep.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: SweepResult,
    /// `None` when not requested, or when no point succeeded.
    pub analysis: Option<Analysis>,
}

impl RunOutput {
    /// Trace of the successful points, if there are any.
    pub fn trace(&self) -> Option<Trace> {
        match &self.analysis {
            Some(a) => Some(a.trace.clone()),
            None => self.result.to_trace().ok(),
        }
    }
}

/// File names for one persisted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub data_csv: PathBuf,
    pub run_json: PathBuf,
}

impl RunPaths {
    pub fn new(out_dir: &Path, run_name: &str) -> Self {
        Self {
            data_csv: out_dir.join(format!("{run_name}_data.csv")),
            run_json: out_dir.join(format!("{run_name}_run.json")),
        }
    }
}

/// Default run name: a local timestamp.
pub fn default_run_name() -> String {
    chrono::Local::now().format("sweep_%Y%m%d_%H%M%S").to_string()
}

/// Sweep with the given instruments, then optionally analyze.
pub fn run_sweep<S, D>(
    controller: &SweepController,
    source: &mut S,
    digitizer: &mut D,
    observer: &mut dyn SweepObserver,
    estimator: Option<&ResonanceEstimator>,
) -> Result<RunOutput, AppError>
where
    S: SignalSource + ?Sized,
    D: Digitizer + ?Sized,
{
    let result = controller.run(source, digitizer, observer)?;
    let analysis = estimator.and_then(|estimator| analyze_result(estimator, &result));
    Ok(RunOutput { result, analysis })
}

/// Run the estimator over the successful points. `None` means declined.
pub fn analyze_result(estimator: &ResonanceEstimator, result: &SweepResult) -> Option<Analysis> {
    let report = estimator.analyze_sweep(result)?;
    let trace = result.to_trace().ok()?;
    Some(Analysis { trace, report })
}

/// Sweep the simulated bench.
pub fn run_simulated(
    sweep: SweepConfig,
    bench: BenchSettings,
    estimator: Option<EstimatorConfig>,
    observer: &mut dyn SweepObserver,
) -> Result<RunOutput, AppError> {
    let controller = SweepController::new(sweep)?;
    let estimator = estimator.map(ResonanceEstimator::new).transpose()?;
    let mut bench = SimulatedBench::new(bench)?;
    run_sweep(
        &controller,
        &mut bench.source,
        &mut bench.digitizer,
        observer,
        estimator.as_ref(),
    )
}

/// Sweep the simulated bench silently. Convenience for tests and scripting.
pub fn run_simulated_quiet(
    sweep: SweepConfig,
    bench: BenchSettings,
    estimator: Option<EstimatorConfig>,
) -> Result<RunOutput, AppError> {
    run_simulated(sweep, bench, estimator, &mut NullObserver)
}

/// Write `<run>_data.csv` (when any point succeeded) and `<run>_run.json`.
pub fn persist_run(paths: &RunPaths, source: &str, config: &SweepConfig, output: &RunOutput) -> Result<(), AppError> {
    match &output.analysis {
        Some(a) => {
            let smoothed = a.report.smoothed_on_raw_scale(a.trace.frequencies());
            write_trace_csv(&paths.data_csv, &a.trace, Some(&smoothed))?;
            log::info!("Wrote trace to {}", paths.data_csv.display());
        }
        None => match output.result.to_trace() {
            Ok(trace) => {
                write_trace_csv(&paths.data_csv, &trace, None)?;
                log::info!("Wrote trace to {}", paths.data_csv.display());
            }
            Err(e) => log::warn!("No trace written: {e}"),
        },
    }

    let record = RunRecord::new(source, config, &output.result);
    write_run_json(&paths.run_json, &record)?;
    log::info!("Wrote run record to {}", paths.run_json.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::domain::{EstimateMethod, Polarity};
    use crate::io::{read_run_json, read_trace_csv};

    fn fast_sweep() -> SweepConfig {
        SweepConfig {
            settle_delay: Duration::ZERO,
            eta_after_points: 0,
            ..SweepConfig::default()
        }
    }

    fn dip_estimator() -> EstimatorConfig {
        EstimatorConfig {
            polarity: Polarity::Dip,
            ..EstimatorConfig::default()
        }
    }

    #[test]
    fn simulated_dip_is_found_by_every_method() {
        let output = run_simulated_quiet(fast_sweep(), BenchSettings::default(), Some(dip_estimator())).unwrap();

        assert_eq!(output.result.grid_len(), 1501);
        assert_eq!(output.result.success_count(), 1501);
        let analysis = output.analysis.expect("analysis");
        for method in EstimateMethod::ALL {
            let f = analysis
                .report
                .estimate(method)
                .frequency()
                .unwrap_or_else(|| panic!("{} not found", method.display_name()));
            assert!((f - 1775.3).abs() < 0.5, "{}: {f}", method.display_name());
        }
    }

    #[test]
    fn all_reads_failing_declines_analysis_without_error() {
        let bench = BenchSettings {
            failure_probability: 1.0,
            ..BenchSettings::default()
        };
        let sweep = SweepConfig {
            grid: crate::domain::GridSpec {
                min_mhz: 1770.0,
                max_mhz: 1771.0,
                ..crate::domain::GridSpec::default()
            },
            ..fast_sweep()
        };
        let output = run_simulated_quiet(sweep, bench, Some(dip_estimator())).unwrap();

        assert_eq!(output.result.success_count(), 0);
        assert_eq!(output.result.failed_frequencies().len(), output.result.grid_len());
        assert!(output.analysis.is_none());
        assert!(output.trace().is_none());
    }

    #[test]
    fn persisted_run_reloads() {
        let dir = tempdir().unwrap();
        let sweep = SweepConfig {
            grid: crate::domain::GridSpec {
                min_mhz: 1760.0,
                max_mhz: 1790.0,
                ..crate::domain::GridSpec::default()
            },
            ..fast_sweep()
        };
        let output = run_simulated_quiet(sweep.clone(), BenchSettings::default(), Some(dip_estimator())).unwrap();
        let paths = RunPaths::new(dir.path(), "unit");
        persist_run(&paths, "simulation", &sweep, &output).unwrap();

        let loaded = read_trace_csv(&paths.data_csv).unwrap();
        assert_eq!(loaded.trace.len(), 301);
        assert_eq!(loaded.smoothed.as_ref().map(Vec::len), Some(301));

        let record = read_run_json(&paths.run_json).unwrap();
        assert_eq!(record.source, "simulation");
        assert_eq!(record.successful_points, 301);
        assert_eq!(record.config, sweep);
    }

    #[test]
    fn run_paths_use_run_name() {
        let paths = RunPaths::new(Path::new("out"), "r1");
        assert_eq!(paths.data_csv, PathBuf::from("out/r1_data.csv"));
        assert_eq!(paths.run_json, PathBuf::from("out/r1_run.json"));
    }
}
