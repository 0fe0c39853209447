//! Method C: prominence-filtered extremum detection.
//!
//! Dips are handled by negating the signal, so everything below looks for
//! peaks. Candidates are strict local maxima (a flat top counts once, at its
//! midpoint), thinned so no two are closer than `distance` samples (taller
//! wins), then filtered by topographic prominence. The most prominent
//! survivor is the estimate.

use crate::domain::{EstimateDetail, Polarity, ResonanceEstimate};

/// Shortest trace with an interior sample.
pub const MIN_DETECTION_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    /// Minimum sample spacing between candidates (≥ 1).
    pub distance: usize,
    /// Candidates must be strictly more prominent than this.
    pub threshold: f64,
}

pub fn detect_peak(
    frequencies: &[f64],
    smoothed: &[f64],
    polarity: Polarity,
    settings: DetectionSettings,
) -> ResonanceEstimate {
    let n = smoothed.len();
    if n < MIN_DETECTION_POINTS {
        return ResonanceEstimate::not_found(format!(
            "need at least {MIN_DETECTION_POINTS} points for peak detection, got {n}"
        ));
    }

    let sign = polarity.sign();
    let x: Vec<f64> = smoothed.iter().map(|v| sign * v).collect();

    let maxima = local_maxima(&x);
    let spaced = select_by_distance(&maxima, &x, settings.distance.max(1));
    // Rounding ripple on a constant signal must not count as a feature.
    let floor = x.iter().fold(0.0_f64, |m, v| m.max(v.abs())) * 1e-12;
    let threshold = settings.threshold.max(floor);

    let mut candidates = 0;
    let mut best: Option<(usize, f64)> = None;
    for &peak in &spaced {
        let p = prominence(&x, peak);
        if p <= threshold {
            continue;
        }
        candidates += 1;
        // Candidates come in index order, so a tie keeps the lower frequency.
        if best.is_none_or(|(_, bp)| p > bp) {
            best = Some((peak, p));
        }
    }

    match best {
        Some((index, prominence)) => ResonanceEstimate::Found {
            frequency: frequencies[index],
            detail: EstimateDetail::PeakDetection {
                index,
                prominence,
                threshold: settings.threshold,
                candidates,
            },
        },
        None => ResonanceEstimate::not_found(format!(
            "no {} above prominence {:.4e} ({} local extrema examined)",
            polarity.display_name().to_lowercase(),
            settings.threshold,
            spaced.len()
        )),
    }
}

/// Indices of local maxima, excluding the endpoints. A plateau reports its
/// midpoint (rounded down).
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut out = Vec::new();
    if x.len() < 3 {
        return out;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                out.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    out
}

/// Drop peaks closer than `distance` samples to a taller one. Equal heights
/// keep the later peak, as the stable ordering visits it first.
pub fn select_by_distance(peaks: &[usize], x: &[f64], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in (j + 1)..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }
    peaks
        .iter()
        .zip(&keep)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect()
}

/// Topographic prominence: height above the higher of the two lowest points
/// reached before the signal rises above the peak on either side.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}
