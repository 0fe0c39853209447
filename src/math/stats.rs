//! Small robust statistics helpers.

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Median of the finite values (`None` if there are none).
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Noise sigma estimated from first differences.
///
/// For white noise `Δy` has sigma `√2·σ`; the median makes the estimate
/// insensitive to the few large differences a real feature contributes.
/// Returns 0 for fewer than two samples.
pub fn diff_noise_sigma(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    median(&diffs).map_or(0.0, |m| MAD_TO_SIGMA * m / std::f64::consts::SQRT_2)
}
