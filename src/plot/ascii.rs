//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output.
//!
//! Plot elements:
//! - smoothed signal (baseline added back): `-` line
//! - raw samples: `.`
//! - estimates: `A` (extremum), `B` (peak fit), `C` (peak detection)

use crate::domain::{EstimateMethod, ResonanceEstimate, Trace};
use crate::estimate::ResonanceReport;

/// Marker letter for each method.
pub fn marker(method: EstimateMethod) -> char {
    match method {
        EstimateMethod::Extremum => 'A',
        EstimateMethod::PeakFit => 'B',
        EstimateMethod::PeakDetection => 'C',
    }
}

/// Render the trace, plus the smoothed overlay and estimate markers when a
/// report is given.
pub fn render_ascii_plot(trace: &Trace, report: Option<&ResonanceReport>, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let frequencies = trace.frequencies();
    let (f_min, f_max) = frequency_range(trace);
    let overlay: Option<Vec<f64>> = report.map(|r| r.smoothed_on_raw_scale(frequencies));

    let (y_min, y_max) = y_range(trace.signal(), overlay.as_deref()).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    if let Some(curve) = &overlay {
        let points: Vec<(f64, f64)> = frequencies.iter().copied().zip(curve.iter().copied()).collect();
        draw_curve(&mut grid, &points, f_min, f_max, y_min, y_max);
    }

    for (&f, &y) in frequencies.iter().zip(trace.signal()) {
        let x = map_x(f, f_min, f_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = '.';
    }

    let mut legend = Vec::new();
    if let Some(report) = report {
        let curve = overlay.as_deref().unwrap_or(trace.signal());
        for (method, estimate) in report.estimates() {
            let letter = marker(method);
            match estimate {
                ResonanceEstimate::Found { frequency, .. } => {
                    let x = map_x(*frequency, f_min, f_max, width);
                    let row = map_y(value_near(frequencies, curve, *frequency), y_min, y_max, height);
                    grid[row][x] = letter;
                    legend.push(format!("{letter} {}: {frequency:.4} MHz", method.display_name()));
                }
                ResonanceEstimate::NotFound { .. } => {
                    legend.push(format!("{letter} {}: not found", method.display_name()));
                }
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: f=[{f_min:.3}, {f_max:.3}] MHz | signal=[{y_min:.4}, {y_max:.4}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    for line in legend {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn frequency_range(trace: &Trace) -> (f64, f64) {
    let (lo, hi) = (trace.first_frequency(), trace.last_frequency());
    if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) }
}

/// Value of `curve` at the sample closest to `frequency`.
fn value_near(frequencies: &[f64], curve: &[f64], frequency: f64) -> f64 {
    let idx = frequencies.partition_point(|&f| f < frequency);
    let idx = match idx {
        0 => 0,
        i if i >= frequencies.len() => frequencies.len() - 1,
        i if (frequencies[i] - frequency) < (frequency - frequencies[i - 1]) => i,
        i => i - 1,
    };
    curve[idx]
}

fn y_range(signal: &[f64], curve: Option<&[f64]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &y in signal.iter().chain(curve.unwrap_or(&[])) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() && min_y == max_y {
        Some((min_y - 0.5, max_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(f: f64, f_min: f64, f_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((f - f_min) / (f_max - f_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y_max is row 0.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], f_min: f64, f_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(f, y) in curve {
        let x = map_x(f, f_min, f_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, row, '-');
        } else {
            grid[row][x] = '-';
        }
        prev = Some((x, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EstimatorConfig, Polarity};
    use crate::estimate::ResonanceEstimator;

    #[test]
    fn plot_golden_snapshot_small() {
        let trace = Trace::new(vec![1.0, 10.0], vec![100.0, 110.0]).unwrap();
        let txt = render_ascii_plot(&trace, None, 10, 5);
        let expected = concat!(
            "Plot: f=[1.000, 10.000] MHz | signal=[99.5000, 110.5000]\n",
            "         .\n",
            "          \n",
            "          \n",
            "          \n",
            ".         \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn markers_and_legend_follow_the_report() {
        let f: Vec<f64> = (0..40).map(|i| 1700.0 + i as f64).collect();
        let y: Vec<f64> = (0..40).map(|i| if i == 20 { -1.0 } else { 0.0 }).collect();
        let trace = Trace::new(f, y).unwrap();
        let config = EstimatorConfig {
            polarity: Polarity::Dip,
            smoothing: None,
            ..EstimatorConfig::default()
        };
        let report = ResonanceEstimator::new(config).unwrap().analyze(&trace);
        let txt = render_ascii_plot(&trace, Some(&report), 40, 10);

        assert!(txt.contains("A Extremum: 1720.0000 MHz"), "{txt}");
        assert!(txt.lines().any(|l| l.starts_with("B Peak fit")));
        assert!(txt.lines().any(|l| l.starts_with("C Peak detection")));
        // The dip sits on the bottom row.
        let rows: Vec<&str> = txt.lines().skip(1).take(10).collect();
        assert!(rows[9].contains('A') || rows[9].contains('C'), "{txt}");
    }

    #[test]
    fn nearest_sample_lookup() {
        let f = [0.0, 1.0, 2.0];
        let v = [10.0, 20.0, 30.0];
        assert_eq!(value_near(&f, &v, -5.0), 10.0);
        assert_eq!(value_near(&f, &v, 0.4), 10.0);
        assert_eq!(value_near(&f, &v, 0.6), 20.0);
        assert_eq!(value_near(&f, &v, 9.0), 30.0);
    }
}
