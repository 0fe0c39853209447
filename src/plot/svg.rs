//! SVG chart of one analysis, rendered with Plotters.
//!
//! Series: raw samples, smoothed signal (baseline added back), the fitted
//! line shape when the peak fit converged, and one marker per found
//! estimate.

use std::error::Error;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::domain::{EstimateDetail, EstimateMethod, ResonanceEstimate};
use crate::error::{AppError, EXIT_USAGE};
use crate::models::predict;
use crate::report::{AnalysisView, ReportSink};

#[derive(Debug, Clone)]
pub struct SvgStyle {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
        }
    }
}

fn method_color(method: EstimateMethod) -> RGBColor {
    match method {
        EstimateMethod::Extremum => RGBColor(214, 39, 40),
        EstimateMethod::PeakFit => RGBColor(44, 160, 44),
        EstimateMethod::PeakDetection => RGBColor(148, 103, 189),
    }
}

/// Render the chart to an SVG document.
pub fn render_svg(view: &AnalysisView<'_>, style: &SvgStyle) -> Result<String, AppError> {
    let mut svg = String::new();
    draw_chart(&mut svg, view, style)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to render SVG chart: {e}")))?;
    Ok(svg)
}

pub fn write_svg(path: &Path, view: &AnalysisView<'_>, style: &SvgStyle) -> Result<(), AppError> {
    let svg = render_svg(view, style)?;
    std::fs::write(path, svg)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to write SVG '{}': {e}", path.display())))
}

fn draw_chart(svg: &mut String, view: &AnalysisView<'_>, style: &SvgStyle) -> Result<(), Box<dyn Error>> {
    let frequencies = view.trace.frequencies();
    let raw = view.trace.signal();
    let smoothed = view.report.smoothed_on_raw_scale(frequencies);
    let fitted = fitted_curve(view);

    let (f0, f1) = (view.trace.first_frequency(), view.trace.last_frequency());
    let (f0, f1) = if f1 > f0 { (f0, f1) } else { (f0 - 0.5, f1 + 0.5) };
    let (y0, y1) = bounds(raw.iter().chain(&smoothed).chain(fitted.iter().flatten().map(|(_, y)| y)));

    let root = SVGBackend::with_string(svg, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(view.label, ("sans-serif", 18))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(f0..f1, y0..y1)?;
    chart
        .configure_mesh()
        .light_line_style(BLACK.mix(0.05))
        .x_desc("Frequency (MHz)")
        .y_desc("Signal")
        .draw()?;

    let raw_color = RGBColor(160, 160, 160);
    chart
        .draw_series(
            frequencies
                .iter()
                .zip(raw)
                .map(|(&f, &y)| Circle::new((f, y), 1, raw_color.filled())),
        )?
        .label("raw")
        .legend(move |(x, y)| Rectangle::new([(x + 7, y - 3), (x + 13, y + 3)], raw_color.filled()));

    let smooth_color = RGBColor(31, 119, 180);
    chart
        .draw_series(LineSeries::new(
            frequencies.iter().copied().zip(smoothed.iter().copied()),
            smooth_color.stroke_width(2),
        ))?
        .label("smoothed")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], smooth_color));

    if let Some(curve) = fitted {
        let color = method_color(EstimateMethod::PeakFit);
        chart
            .draw_series(LineSeries::new(curve, color.mix(0.8)))?
            .label(format!("{} fit", view.report.shape.display_name()))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    for (method, estimate) in view.report.estimates() {
        let ResonanceEstimate::Found { frequency, .. } = estimate else {
            continue;
        };
        let color = method_color(method);
        let frequency = *frequency;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(frequency, y0), (frequency, y1)],
                color.mix(0.6),
            )))?
            .label(format!("{}: {frequency:.3} MHz", method.display_name()))
            .legend(move |(x, y)| PathElement::new(vec![(x + 10, y - 6), (x + 10, y + 6)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK.mix(0.3))
        .background_style(WHITE.mix(0.9))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Fitted line shape on the raw scale, sampled at the trace frequencies.
fn fitted_curve(view: &AnalysisView<'_>) -> Option<Vec<(f64, f64)>> {
    let ResonanceEstimate::Found {
        detail: EstimateDetail::PeakFit(fit),
        ..
    } = &view.report.peak_fit
    else {
        return None;
    };
    let params = [fit.offset, fit.amplitude, fit.center, fit.width.ln()];
    let baseline = view.report.baseline.as_ref();
    Some(
        view.trace
            .frequencies()
            .iter()
            .map(|&f| {
                let base = baseline.map_or(0.0, |b| b.eval(f));
                (f, predict(fit.shape, f, &params) + base)
            })
            .collect(),
    )
}

fn bounds<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-9);
    (lo - pad, hi + pad)
}

/// Writes one SVG file per published analysis.
#[derive(Debug, Clone)]
pub struct SvgSink {
    pub path: PathBuf,
    pub style: SvgStyle,
}

impl SvgSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            style: SvgStyle::default(),
        }
    }
}

impl ReportSink for SvgSink {
    fn publish(&mut self, analysis: &AnalysisView<'_>) -> Result<(), AppError> {
        write_svg(&self.path, analysis, &self.style)?;
        log::info!("Wrote chart to {}", self.path.display());
        Ok(())
    }
}
