//! Formatted terminal output for sweeps and estimates.
//!
//! Formatting lives here so the sweep and estimation code never prints.

use crate::domain::{EstimateDetail, ResonanceEstimate, SweepConfig, SweepResult, Trace};
use crate::estimate::ResonanceReport;

/// At most this many failed frequencies are listed individually.
const MAX_LISTED_FAILURES: usize = 10;

pub fn format_sweep_summary(config: &SweepConfig, result: &SweepResult) -> String {
    let mut out = String::new();
    let grid = &config.grid;

    out.push_str("=== resonance - Sweep ===\n");
    out.push_str(&format!(
        "Grid: [{:.3}, {:.3}] MHz | step={:.3} MHz | points={}\n",
        grid.min_mhz,
        grid.max_mhz,
        grid.step_mhz,
        result.grid_len()
    ));
    out.push_str(&format!(
        "Source: {:.2} dBm | averages={} | channel={} | settle={} ms\n",
        config.power_dbm,
        config.averages,
        config.probe_channel,
        config.settle_delay.as_millis()
    ));
    let elapsed = (result.finished_at - result.started_at).num_milliseconds() as f64 / 1000.0;
    out.push_str(&format!(
        "Run: {} -> {} ({elapsed:.1} s)\n",
        result.started_at.format("%Y-%m-%d %H:%M:%S"),
        result.finished_at.format("%H:%M:%S")
    ));

    let failed = result.failed_frequencies();
    out.push_str(&format!(
        "Points: ok={} | failed={}\n",
        result.success_count(),
        failed.len()
    ));
    if !failed.is_empty() {
        let listed: Vec<String> = failed
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|f| format!("{f:.3}"))
            .collect();
        let more = failed.len().saturating_sub(MAX_LISTED_FAILURES);
        out.push_str(&format!("Failed frequencies (MHz): {}", listed.join(", ")));
        if more > 0 {
            out.push_str(&format!(" ... (+{more} more)"));
        }
        out.push('\n');
    }

    out
}

pub fn format_estimate_summary(label: &str, trace: &Trace, report: &ResonanceReport) -> String {
    let mut out = String::new();

    out.push_str("=== resonance - Resonance estimates ===\n");
    out.push_str(&format!("Input: {label}\n"));
    out.push_str(&format!(
        "Points: n={} | f=[{:.3}, {:.3}] MHz\n",
        trace.len(),
        trace.first_frequency(),
        trace.last_frequency()
    ));
    out.push_str(&format!(
        "Polarity: {} | shape: {}\n",
        report.polarity.display_name(),
        report.shape.display_name()
    ));
    match report.smoothing_window {
        Some(w) => out.push_str(&format!("Smoothing: Savitzky-Golay, window={w}\n")),
        None => out.push_str("Smoothing: skipped\n"),
    }
    match &report.baseline {
        Some(b) => out.push_str(&format!("Baseline: polynomial degree {}\n", b.degree())),
        None => out.push_str("Baseline: none\n"),
    }
    out.push_str(&format!("Noise sigma: {:.4e}\n", report.noise_sigma));

    out.push('\n');
    out.push_str(&format!("{:<16} {:>16}  {}\n", "method", "frequency_mhz", "detail"));
    out.push_str(&format!("{:-<16} {:->16}  {:-<6}\n", "", "", ""));
    for (method, estimate) in report.estimates() {
        let (frequency, detail) = match estimate {
            ResonanceEstimate::Found { frequency, detail } => {
                (format!("{frequency:.4}"), format_detail(detail, report))
            }
            ResonanceEstimate::NotFound { reason } => ("-".to_string(), format!("not found: {reason}")),
        };
        out.push_str(format!("{:<16} {frequency:>16}  {detail}\n", method.display_name()).trim_end());
        out.push('\n');
    }

    let found: Vec<f64> = report.estimates().filter_map(|(_, e)| e.frequency()).collect();
    if found.len() > 1 {
        let lo = found.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = found.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        out.push_str(&format!("\nSpread across methods: {:.4} MHz\n", hi - lo));
    }

    out
}

fn format_detail(detail: &EstimateDetail, report: &ResonanceReport) -> String {
    match detail {
        EstimateDetail::Extremum { index, signal } => format!("signal={signal:.6} (index {index})"),
        EstimateDetail::PeakFit(fit) => format!(
            "{}={:.4} amplitude={:.6} offset={:.6} rmse={:.3e} iterations={}",
            fit.shape.width_label(),
            fit.width,
            fit.amplitude,
            fit.offset,
            fit.rmse,
            fit.iterations
        ),
        EstimateDetail::PeakDetection {
            index,
            prominence,
            threshold,
            candidates,
        } => format!(
            "prominence={prominence:.6} threshold={threshold:.3e} candidates={candidates} (index {index}, {})",
            report.polarity.display_name().to_lowercase()
        ),
    }
}
