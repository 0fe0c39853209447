//! Method A: global extremum of the smoothed signal.

use crate::domain::{EstimateDetail, Polarity, ResonanceEstimate};

/// Index of the global maximum (`Peak`) or minimum (`Dip`); the first
/// occurrence wins ties. `None` only for an empty slice.
pub fn extremum_index(signal: &[f64], polarity: Polarity) -> Option<usize> {
    let sign = polarity.sign();
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in signal.iter().enumerate() {
        let score = sign * v;
        match best {
            Some((_, s)) if score <= s => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn find_extremum(frequencies: &[f64], smoothed: &[f64], polarity: Polarity) -> ResonanceEstimate {
    match extremum_index(smoothed, polarity) {
        Some(index) => ResonanceEstimate::Found {
            frequency: frequencies[index],
            detail: EstimateDetail::Extremum {
                index,
                signal: smoothed[index],
            },
        },
        None => ResonanceEstimate::not_found("empty trace"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_maximum_or_minimum_by_polarity() {
        let s = [0.0, 2.0, -1.0, 1.0];
        assert_eq!(extremum_index(&s, Polarity::Peak), Some(1));
        assert_eq!(extremum_index(&s, Polarity::Dip), Some(2));
    }

    #[test]
    fn ties_resolve_to_first_occurrence() {
        let s = [1.0, 3.0, 3.0, 0.0, 0.0];
        assert_eq!(extremum_index(&s, Polarity::Peak), Some(1));
        assert_eq!(extremum_index(&s, Polarity::Dip), Some(3));
    }

    #[test]
    fn result_is_stable_across_runs() {
        let f = [10.0, 11.0, 12.0, 13.0];
        let s = [0.2, 0.9, 0.9, 0.1];
        let a = find_extremum(&f, &s, Polarity::Peak);
        let b = find_extremum(&f, &s, Polarity::Peak);
        assert_eq!(a, b);
        assert_eq!(a.frequency(), Some(11.0));
    }

    #[test]
    fn single_point_is_its_own_extremum() {
        let e = find_extremum(&[1775.0], &[0.3], Polarity::Dip);
        assert_eq!(e.frequency(), Some(1775.0));
    }
}
