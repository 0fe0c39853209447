//! Command-line parsing for the resonance sweep tool.
//!
//! Parsing lives here; turning flags into `SweepConfig` / `EstimatorConfig`
//! and running the pipeline happens in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{PeakShape, Polarity, ShapeKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "resonance", version, about = "Microwave resonance sweep and estimator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sweep the real instruments (SynthHD source, Red Pitaya digitizer) and persist the run.
    Acquire(AcquireArgs),
    /// Estimate the resonance frequency of a persisted trace CSV.
    Analyze(AnalyzeArgs),
    /// Sweep a simulated bench with a synthetic resonance, then analyze it.
    Simulate(SimulateArgs),
}

/// Frequency grid and per-point acquisition settings.
#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    /// Lowest frequency (MHz).
    #[arg(long = "min", default_value_t = 1700.0)]
    pub min_mhz: f64,

    /// Highest frequency (MHz).
    #[arg(long = "max", default_value_t = 1850.0)]
    pub max_mhz: f64,

    /// Grid step (MHz).
    #[arg(long = "step", default_value_t = 0.1)]
    pub step_mhz: f64,

    /// Round grid values to this many decimals.
    #[arg(long, default_value_t = 1)]
    pub decimals: u32,

    /// Do not round grid values.
    #[arg(long, conflicts_with = "decimals")]
    pub no_rounding: bool,

    /// Source output power (dBm).
    #[arg(long = "power", default_value_t = 10.0, allow_negative_numbers = true)]
    pub power_dbm: f64,

    /// Samples averaged per grid point.
    #[arg(long, default_value_t = 5)]
    pub averages: usize,

    /// Digitizer channel carrying the probe signal.
    #[arg(long, default_value_t = 2)]
    pub channel: u8,

    /// Settling time after each frequency change (ms). Defaults to 100 on
    /// real instruments and 0 in simulation.
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Report the remaining-time estimate after this many points (0 disables).
    #[arg(long, default_value_t = 10)]
    pub eta_after: usize,
}

/// Preprocessing and estimation settings.
#[derive(Debug, Args, Clone)]
pub struct EstimatorArgs {
    /// Whether the resonance is a maximum (peak) or a minimum (dip).
    /// Defaults to `peak`, or to the bench polarity when simulating.
    #[arg(long, value_enum)]
    pub polarity: Option<Polarity>,

    /// Line shape for the parametric fit.
    #[arg(long, value_enum, default_value_t = PeakShape::Auto)]
    pub shape: PeakShape,

    /// Subtract a polynomial baseline before estimating (degree 1 when given
    /// without a value).
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    pub baseline_degree: Option<usize>,

    /// Savitzky-Golay window length (odd).
    #[arg(long, default_value_t = 51)]
    pub window: usize,

    /// Savitzky-Golay polynomial order.
    #[arg(long, default_value_t = 3)]
    pub polyorder: usize,

    /// Skip smoothing.
    #[arg(long)]
    pub no_smooth: bool,

    /// Iteration cap for the peak fit.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Minimum spacing between detected extrema, as a fraction of the trace length.
    #[arg(long, default_value_t = 0.1)]
    pub spacing_fraction: f64,

    /// Absolute prominence floor (signal units).
    #[arg(long, default_value_t = 0.0)]
    pub min_prominence: f64,

    /// Prominence floor in multiples of the estimated noise level.
    #[arg(long, default_value_t = 5.0)]
    pub prominence_sigma: f64,
}

/// Where and how results are shown.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Write an SVG chart of the analysis.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,

    /// Export the three estimates to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Export the trace with its smoothed signal to CSV.
    #[arg(long = "export-trace", value_name = "CSV")]
    pub export_trace: Option<PathBuf>,
}

/// Where a run's data files go.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Directory for `<run>_data.csv` and `<run>_run.json`.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Run name (defaults to a timestamp).
    #[arg(long)]
    pub run_name: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct AcquireArgs {
    /// Red Pitaya host name or address (falls back to `RP_HOST`).
    #[arg(long)]
    pub rp_host: Option<String>,

    /// Red Pitaya SCPI port.
    #[arg(long, default_value_t = crate::instrument::red_pitaya::DEFAULT_PORT)]
    pub rp_port: u16,

    /// SynthHD serial device (falls back to `MW_DEVICE`).
    #[arg(long)]
    pub mw_device: Option<String>,

    /// Instrument I/O timeout (ms).
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Run the estimator on the fresh trace.
    #[arg(long)]
    pub analyze: bool,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub sweep: SweepArgs,

    #[command(flatten)]
    pub estimator: EstimatorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Trace CSV (`Frequency,Signal`) written by `acquire` or `simulate`.
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    #[command(flatten)]
    pub estimator: EstimatorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// The synthetic resonance the simulated bench produces.
#[derive(Debug, Args, Clone)]
pub struct BenchArgs {
    /// Resonance centre (MHz).
    #[arg(long, default_value_t = 1775.3)]
    pub center: f64,

    /// Resonance width (MHz): sigma for Gaussian, HWHM for Lorentzian.
    #[arg(long = "line-width", default_value_t = 5.0)]
    pub line_width: f64,

    /// Resonance depth (signal units).
    #[arg(long, default_value_t = 1.0)]
    pub depth: f64,

    /// Flat signal level away from the resonance.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub baseline: f64,

    /// Line shape of the synthetic resonance.
    #[arg(long = "bench-shape", value_enum, default_value_t = ShapeKind::Lorentzian)]
    pub bench_shape: ShapeKind,

    /// Whether the synthetic resonance is a peak or a dip.
    #[arg(long = "bench-polarity", value_enum, default_value_t = Polarity::Dip)]
    pub bench_polarity: Polarity,

    /// Gaussian noise, as a fraction of the depth.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Probability that a single read returns a malformed reply.
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Persist `<run>_data.csv` and `<run>_run.json` like `acquire` does.
    #[arg(long)]
    pub save: bool,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub bench: BenchArgs,

    #[command(flatten)]
    pub sweep: SweepArgs,

    #[command(flatten)]
    pub estimator: EstimatorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}
