//! Savitzky–Golay smoothing.
//!
//! Each output sample is the value at the window centre of a least-squares
//! polynomial fitted to the surrounding `window` samples. Interior samples use
//! a fixed convolution kernel (row 0 of the pseudo-inverse of the window's
//! Vandermonde matrix). The first and last `window / 2` samples are taken from
//! the polynomial fitted to the first / last full window, evaluated at their
//! offsets, which matches `scipy.signal.savgol_filter(mode="interp")`.

use nalgebra::{DMatrix, DVector};

/// Singular values below this are treated as zero in the pseudo-inverse.
const PINV_EPS: f64 = 1e-12;

/// Smooth `y`; returns `None` if the parameters do not describe a usable
/// filter for this input (even window, `polyorder >= window`, or
/// `window > y.len()`).
pub fn savgol_filter(y: &[f64], window: usize, polyorder: usize) -> Option<Vec<f64>> {
    let n = y.len();
    if window == 0 || window % 2 == 0 || polyorder >= window || window > n {
        return None;
    }
    let half = window / 2;
    if half == 0 {
        return Some(y.to_vec());
    }

    // Offsets are normalized to [-1, 1] to keep high orders well conditioned.
    let scale = half as f64;
    let vander = DMatrix::from_fn(window, polyorder + 1, |i, k| {
        ((i as f64 - half as f64) / scale).powi(k as i32)
    });
    let pinv = vander.pseudo_inverse(PINV_EPS).ok()?;

    let mut out = vec![0.0; n];

    for i in half..n - half {
        let mut acc = 0.0;
        for j in 0..window {
            acc += pinv[(0, j)] * y[i - half + j];
        }
        out[i] = acc;
    }

    let head = &pinv * DVector::from_column_slice(&y[..window]);
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = eval_poly(&head, (i as f64 - half as f64) / scale);
    }

    let tail_start = n - window;
    let tail = &pinv * DVector::from_column_slice(&y[tail_start..]);
    for (i, slot) in out.iter_mut().enumerate().skip(n - half) {
        *slot = eval_poly(&tail, (i as f64 - (tail_start + half) as f64) / scale);
    }

    Some(out)
}

fn eval_poly(coeffs: &DVector<f64>, t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_polynomials_up_to_polyorder() {
        let y: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64 * 0.1;
                1.0 - 2.0 * x + 0.5 * x * x - 0.1 * x * x * x
            })
            .collect();
        let s = savgol_filter(&y, 11, 3).unwrap();
        for (a, b) in y.iter().zip(s.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn reduces_alternating_noise() {
        let y: Vec<f64> = (0..101).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let s = savgol_filter(&y, 21, 2).unwrap();
        let interior_max = s[10..91].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(interior_max < 0.2, "interior residual {interior_max}");
    }

    #[test]
    fn window_equal_to_length_is_a_single_fit() {
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        let s = savgol_filter(&y, 5, 2).unwrap();
        for (a, b) in y.iter().zip(s.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn unusable_parameters_return_none() {
        let y = [0.0; 10];
        assert!(savgol_filter(&y, 4, 2).is_none());
        assert!(savgol_filter(&y, 5, 5).is_none());
        assert!(savgol_filter(&y, 11, 3).is_none());
    }
}
