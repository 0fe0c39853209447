//! Reporting: formatted summaries and the sinks that publish a finished
//! analysis.

pub mod format;

pub use format::*;

use crate::domain::Trace;
use crate::error::AppError;
use crate::estimate::ResonanceReport;

/// A finished analysis, ready to publish.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisView<'a> {
    /// Human-readable name of the input (file path or run name).
    pub label: &'a str,
    pub trace: &'a Trace,
    pub report: &'a ResonanceReport,
}

/// Somewhere a finished analysis can be sent. Sinks only ever see final
/// results, never in-progress sweeps.
pub trait ReportSink {
    fn publish(&mut self, analysis: &AnalysisView<'_>) -> Result<(), AppError>;
}

/// Summary table plus an optional ASCII plot on stdout.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSink {
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self {
            plot: true,
            plot_width: 100,
            plot_height: 25,
        }
    }
}

impl TerminalSink {
    pub fn render(&self, analysis: &AnalysisView<'_>) -> String {
        let mut out = format_estimate_summary(analysis.label, analysis.trace, analysis.report);
        if self.plot {
            out.push('\n');
            out.push_str(&crate::plot::render_ascii_plot(
                analysis.trace,
                Some(analysis.report),
                self.plot_width,
                self.plot_height,
            ));
        }
        out
    }
}

impl ReportSink for TerminalSink {
    fn publish(&mut self, analysis: &AnalysisView<'_>) -> Result<(), AppError> {
        println!("{}", self.render(analysis));
        Ok(())
    }
}
