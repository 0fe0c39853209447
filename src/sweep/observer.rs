//! Progress reporting for a running sweep.
//!
//! The controller never prints; it hands progress to a `SweepObserver`.
//! Observers only watch: nothing they do feeds back into the sweep.

use std::time::Duration;

use chrono::{DateTime, Local};
use log::{info, warn};

use crate::domain::SweepResult;

/// One completed grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointProgress {
    /// 1-based position in the grid.
    pub index: usize,
    pub total: usize,
    pub frequency: f64,
    /// Averaged signal, `None` when the point failed.
    pub signal: Option<f64>,
    pub failure: Option<String>,
}

/// Projected sweep duration, computed once partway through.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEstimate {
    pub points_done: usize,
    pub total_points: usize,
    pub per_point: Duration,
    pub remaining: Duration,
    pub completion_at: DateTime<Local>,
}

impl TimeEstimate {
    /// Extrapolate linearly from `elapsed` over `points_done` points.
    ///
    /// Returns `None` if no point has completed yet.
    pub fn from_elapsed(
        elapsed: Duration,
        points_done: usize,
        total_points: usize,
        now: DateTime<Local>,
    ) -> Option<Self> {
        if points_done == 0 {
            return None;
        }
        let secs_per_point = elapsed.as_secs_f64() / points_done as f64;
        let left = total_points.saturating_sub(points_done) as f64;
        let per_point = saturating_secs(secs_per_point);
        let remaining = saturating_secs(secs_per_point * left);
        let completion_at = chrono::Duration::from_std(remaining)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(now);
        Some(Self {
            points_done,
            total_points,
            per_point,
            remaining,
            completion_at,
        })
    }
}

/// `Duration::MAX` when `secs` does not fit.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

pub trait SweepObserver {
    fn on_start(&mut self, _total_points: usize) {}
    fn on_point(&mut self, _progress: &PointProgress) {}
    fn on_estimate(&mut self, _estimate: &TimeEstimate) {}
    fn on_complete(&mut self, _result: &SweepResult) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SweepObserver for NullObserver {}

/// Reports progress through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SweepObserver for LogObserver {
    fn on_start(&mut self, total_points: usize) {
        info!("Sweeping {total_points} frequencies");
    }

    fn on_point(&mut self, p: &PointProgress) {
        match (p.signal, &p.failure) {
            (Some(signal), _) => info!(
                "[{}/{}] {:.4} MHz -> {signal:.6}",
                p.index, p.total, p.frequency
            ),
            (None, Some(reason)) => warn!(
                "[{}/{}] {:.4} MHz failed: {reason}",
                p.index, p.total, p.frequency
            ),
            (None, None) => warn!("[{}/{}] {:.4} MHz failed", p.index, p.total, p.frequency),
        }
    }

    fn on_estimate(&mut self, e: &TimeEstimate) {
        info!(
            "Time per point: {:.2}s; remaining: {:.1} min; expected completion: {}",
            e.per_point.as_secs_f64(),
            e.remaining.as_secs_f64() / 60.0,
            e.completion_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    fn on_complete(&mut self, result: &SweepResult) {
        info!(
            "Sweep complete: {} of {} points succeeded",
            result.success_count(),
            result.grid_len()
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn estimate_extrapolates_linearly() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let e = TimeEstimate::from_elapsed(Duration::from_secs(20), 10, 1501, now).unwrap();
        assert_eq!(e.per_point, Duration::from_secs(2));
        assert_eq!(e.remaining, Duration::from_secs(2 * 1491));
        assert_eq!(e.completion_at, now + chrono::Duration::seconds(2982));
    }

    #[test]
    fn estimate_needs_a_completed_point() {
        let now = Local::now();
        assert!(TimeEstimate::from_elapsed(Duration::from_secs(1), 0, 10, now).is_none());
    }

    #[test]
    fn estimate_at_the_end_has_nothing_remaining() {
        let now = Local::now();
        let e = TimeEstimate::from_elapsed(Duration::from_millis(500), 5, 5, now).unwrap();
        assert_eq!(e.remaining, Duration::ZERO);
        assert_eq!(e.completion_at, now);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn estimate_handles_counts_beyond_u32() {
        let now = Local::now();
        let done = 1usize << 33;
        let e = TimeEstimate::from_elapsed(Duration::from_secs(1 << 33), done, 3 * done, now).unwrap();
        assert_eq!(e.per_point, Duration::from_secs(1));
        assert_eq!(e.remaining, Duration::from_secs(1 << 34));
    }

    #[test]
    fn estimate_saturates_instead_of_overflowing() {
        let now = Local::now();
        let e = TimeEstimate::from_elapsed(Duration::from_secs(u64::MAX / 2), 1, usize::MAX, now).unwrap();
        assert_eq!(e.remaining, Duration::MAX);
        assert_eq!(e.completion_at, now);
    }
}
