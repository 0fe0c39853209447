//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds the immutable sweep and estimator configurations
//! - connects instruments (or the simulated bench) and runs the sweep
//! - prints summaries/plots
//! - writes run files and optional exports

use std::time::Duration;

use clap::Parser;
use log::{info, warn};

use crate::cli::{AcquireArgs, AnalyzeArgs, BenchArgs, Command, EstimatorArgs, OutputArgs, SimulateArgs, SweepArgs};
use crate::domain::{EstimatorConfig, GridSpec, Polarity, SmoothingConfig, SweepConfig, Trace};
use crate::error::{AppError, EXIT_USAGE};
use crate::estimate::{ResonanceEstimator, ResonanceReport};
use crate::instrument::{BenchSettings, RedPitaya, SynthHd};
use crate::io::{EstimateFile, read_trace_csv, write_estimates_json, write_trace_csv};
use crate::plot::SvgSink;
use crate::report::{AnalysisView, ReportSink, TerminalSink, format_sweep_summary};
use crate::sweep::{LogObserver, SweepController};

pub mod pipeline;

use pipeline::{RunOutput, RunPaths};

/// Settling delay used on real instruments when `--settle-ms` is not given.
const DEFAULT_SETTLE_MS: u64 = 100;

/// Entry point for the `resonance` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Acquire(args) => handle_acquire(args),
        Command::Analyze(args) => handle_analyze(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_acquire(args: AcquireArgs) -> Result<(), AppError> {
    let sweep = sweep_config_from_args(&args.sweep, DEFAULT_SETTLE_MS);
    let estimator = estimator_for(args.analyze, &args.estimator, Polarity::Peak)?;
    // Reject bad settings before any instrument is opened.
    let controller = SweepController::new(sweep.clone())?;

    let endpoints = InstrumentEndpoints::resolve(args.rp_host.clone(), args.mw_device.clone())?;
    let timeout = Duration::from_millis(args.timeout_ms);
    let mut digitizer = RedPitaya::connect(&endpoints.rp_host, args.rp_port, timeout)?;
    let mut source = SynthHd::open(&endpoints.mw_device, timeout)?;

    let output = pipeline::run_sweep(
        &controller,
        &mut source,
        &mut digitizer,
        &mut LogObserver,
        estimator.as_ref(),
    )?;

    let run_name = args.run.run_name.clone().unwrap_or_else(pipeline::default_run_name);
    let paths = RunPaths::new(&args.run.out_dir, &run_name);
    pipeline::persist_run(&paths, "instruments", &sweep, &output)?;

    present_run(&run_name, &sweep, &output, &args.output)
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let sweep = sweep_config_from_args(&args.sweep, 0);
    let bench = bench_settings_from_args(&args.bench);
    let estimator = estimator_config_from_args(&args.estimator, bench.polarity);
    estimator.validate()?;

    let output = pipeline::run_simulated(sweep.clone(), bench, Some(estimator), &mut LogObserver)?;

    let run_name = args.run.run_name.clone().unwrap_or_else(pipeline::default_run_name);
    if args.save {
        let paths = RunPaths::new(&args.run.out_dir, &run_name);
        pipeline::persist_run(&paths, "simulation", &sweep, &output)?;
    }

    present_run(&run_name, &sweep, &output, &args.output)
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = estimator_config_from_args(&args.estimator, Polarity::Peak);
    let estimator = ResonanceEstimator::new(config)?;

    let loaded = read_trace_csv(&args.data)?;
    for err in &loaded.row_errors {
        warn!("Skipped {}:{}: {}", args.data.display(), err.line, err.message);
    }
    info!(
        "Loaded {} of {} rows from {}",
        loaded.trace.len(),
        loaded.rows_read,
        args.data.display()
    );

    let report = estimator.analyze(&loaded.trace);
    let label = args.data.display().to_string();
    publish_analysis(&label, &loaded.trace, &report, &args.output)
}

/// Print the sweep summary, then either the analysis or a plain trace plot.
fn present_run(label: &str, sweep: &SweepConfig, output: &RunOutput, args: &OutputArgs) -> Result<(), AppError> {
    println!("{}", format_sweep_summary(sweep, &output.result));

    if let Some(analysis) = &output.analysis {
        return publish_analysis(label, &analysis.trace, &analysis.report, args);
    }

    match output.trace() {
        Some(trace) if !args.no_plot => {
            println!(
                "{}",
                crate::plot::render_ascii_plot(&trace, None, args.width, args.height)
            );
        }
        Some(_) => {}
        None => println!("No successful points; analysis declined."),
    }
    Ok(())
}

fn publish_analysis(label: &str, trace: &Trace, report: &ResonanceReport, args: &OutputArgs) -> Result<(), AppError> {
    let view = AnalysisView { label, trace, report };

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(TerminalSink {
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
    })];
    if let Some(path) = &args.svg {
        sinks.push(Box::new(SvgSink::new(path)));
    }
    for sink in &mut sinks {
        sink.publish(&view)?;
    }

    if let Some(path) = &args.export {
        let export = EstimateFile::from_report(label, trace.len(), report);
        write_estimates_json(path, &export)?;
        println!("Wrote estimates to {}", path.display());
    }
    if let Some(path) = &args.export_trace {
        let smoothed = report.smoothed_on_raw_scale(trace.frequencies());
        write_trace_csv(path, trace, Some(&smoothed))?;
        println!("Wrote trace to {}", path.display());
    }

    Ok(())
}

/// Validated estimator for `acquire`, or `None` when analysis was not requested.
fn estimator_for(
    enabled: bool,
    args: &EstimatorArgs,
    default_polarity: Polarity,
) -> Result<Option<ResonanceEstimator>, AppError> {
    if !enabled {
        return Ok(None);
    }
    let config = estimator_config_from_args(args, default_polarity);
    Ok(Some(ResonanceEstimator::new(config)?))
}

pub fn sweep_config_from_args(args: &SweepArgs, default_settle_ms: u64) -> SweepConfig {
    SweepConfig {
        grid: GridSpec {
            min_mhz: args.min_mhz,
            max_mhz: args.max_mhz,
            step_mhz: args.step_mhz,
            decimals: if args.no_rounding { None } else { Some(args.decimals) },
        },
        power_dbm: args.power_dbm,
        averages: args.averages,
        probe_channel: args.channel,
        settle_delay: Duration::from_millis(args.settle_ms.unwrap_or(default_settle_ms)),
        eta_after_points: args.eta_after,
    }
}

pub fn estimator_config_from_args(args: &EstimatorArgs, default_polarity: Polarity) -> EstimatorConfig {
    EstimatorConfig {
        polarity: args.polarity.unwrap_or(default_polarity),
        shape: args.shape,
        baseline_degree: args.baseline_degree,
        smoothing: (!args.no_smooth).then_some(SmoothingConfig {
            window: args.window,
            polyorder: args.polyorder,
        }),
        max_fit_iterations: args.max_iterations,
        peak_spacing_fraction: args.spacing_fraction,
        min_prominence: args.min_prominence,
        prominence_sigma: args.prominence_sigma,
    }
}

pub fn bench_settings_from_args(args: &BenchArgs) -> BenchSettings {
    BenchSettings {
        center_mhz: args.center,
        width_mhz: args.line_width,
        depth: args.depth,
        baseline: args.baseline,
        shape: args.bench_shape,
        polarity: args.bench_polarity,
        noise_fraction: args.noise,
        failure_probability: args.failure_rate,
        seed: args.seed,
    }
}

/// Instrument addresses from flags, falling back to `.env` / the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstrumentEndpoints {
    rp_host: String,
    mw_device: String,
}

impl InstrumentEndpoints {
    fn resolve(rp_host: Option<String>, mw_device: Option<String>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            rp_host: flag_or_env(rp_host, "RP_HOST", "--rp-host")?,
            mw_device: flag_or_env(mw_device, "MW_DEVICE", "--mw-device")?,
        })
    }
}

fn flag_or_env(flag: Option<String>, var: &str, flag_name: &str) -> Result<String, AppError> {
    if let Some(value) = flag {
        return Ok(value);
    }
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            AppError::new(
                EXIT_USAGE,
                format!("Missing {var}. Pass {flag_name} or set it in the environment (or .env)."),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use crate::domain::PeakShape;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn simulate_estimator_follows_bench_polarity() {
        let Command::Simulate(args) = parse(&["resonance", "simulate"]) else {
            panic!("expected simulate");
        };
        let bench = bench_settings_from_args(&args.bench);
        let config = estimator_config_from_args(&args.estimator, bench.polarity);
        assert_eq!(config.polarity, Polarity::Dip);
        assert_eq!(config.shape_kind(), crate::domain::ShapeKind::Lorentzian);
        assert_eq!(sweep_config_from_args(&args.sweep, 0).settle_delay, Duration::ZERO);
    }

    #[test]
    fn flags_map_onto_configs() {
        let Command::Analyze(args) = parse(&[
            "resonance",
            "analyze",
            "--data",
            "x.csv",
            "--no-smooth",
            "--shape",
            "gaussian",
            "--baseline-degree",
            "1",
        ]) else {
            panic!("expected analyze");
        };
        let config = estimator_config_from_args(&args.estimator, Polarity::Peak);
        assert_eq!(config.smoothing, None);
        assert_eq!(config.shape, PeakShape::Gaussian);
        assert_eq!(config.baseline_degree, Some(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sweep_flags_map_onto_config() {
        let Command::Acquire(args) = parse(&[
            "resonance",
            "acquire",
            "--min",
            "1760",
            "--max",
            "1790",
            "--no-rounding",
            "--averages",
            "3",
        ]) else {
            panic!("expected acquire");
        };
        let config = sweep_config_from_args(&args.sweep, DEFAULT_SETTLE_MS);
        assert_eq!(config.grid.min_mhz, 1760.0);
        assert_eq!(config.grid.decimals, None);
        assert_eq!(config.averages, 3);
        assert_eq!(config.settle_delay, Duration::from_millis(100));
    }

    #[test]
    fn explicit_flag_wins_over_environment() {
        let value = flag_or_env(Some("rp.local".into()), "RESONANCE_TEST_UNSET_VAR", "--rp-host").unwrap();
        assert_eq!(value, "rp.local");

        let err = flag_or_env(None, "RESONANCE_TEST_UNSET_VAR", "--rp-host").unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert!(err.to_string().contains("--rp-host"));
    }
}
