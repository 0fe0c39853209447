//! JSON run records and estimate exports.
//!
//! A run record is the complete, reloadable output of one sweep: the
//! settings it ran with and every grid point (averaged or failed). The
//! estimate export is the analysis side: the three method results plus the
//! preprocessing that produced them.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{EstimateMethod, Polarity, ResonanceEstimate, ShapeKind, SweepConfig, SweepResult};
use crate::error::{AppError, EXIT_USAGE};
use crate::estimate::ResonanceReport;

pub const TOOL_NAME: &str = "resonance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub tool: String,
    /// Where the data came from (`"instruments"` or `"simulation"`).
    pub source: String,
    pub config: SweepConfig,
    pub successful_points: usize,
    pub failed_frequencies: Vec<f64>,
    pub result: SweepResult,
}

impl RunRecord {
    pub fn new(source: impl Into<String>, config: &SweepConfig, result: &SweepResult) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            source: source.into(),
            config: config.clone(),
            successful_points: result.success_count(),
            failed_frequencies: result.failed_frequencies(),
            result: result.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEstimate {
    pub method: EstimateMethod,
    pub estimate: ResonanceEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateFile {
    pub tool: String,
    pub generated_at: DateTime<Local>,
    /// Input the analysis ran on (file path or run name).
    pub input: String,
    pub points: usize,
    pub polarity: Polarity,
    pub shape: ShapeKind,
    pub smoothing_window: Option<usize>,
    pub baseline_degree: Option<usize>,
    pub noise_sigma: f64,
    pub estimates: Vec<MethodEstimate>,
}

impl EstimateFile {
    pub fn from_report(input: impl Into<String>, points: usize, report: &ResonanceReport) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            generated_at: Local::now(),
            input: input.into(),
            points,
            polarity: report.polarity,
            shape: report.shape,
            smoothing_window: report.smoothing_window,
            baseline_degree: report.baseline.as_ref().map(|b| b.degree()),
            noise_sigma: report.noise_sigma,
            estimates: report
                .estimates()
                .map(|(method, estimate)| MethodEstimate {
                    method,
                    estimate: estimate.clone(),
                })
                .collect(),
        }
    }
}

pub fn write_run_json(path: &Path, record: &RunRecord) -> Result<(), AppError> {
    write_json(path, record, "run record")
}

pub fn read_run_json(path: &Path) -> Result<RunRecord, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to open run record '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(EXIT_USAGE, format!("Invalid run record JSON: {e}")))
}

pub fn write_estimates_json(path: &Path, estimates: &EstimateFile) -> Result<(), AppError> {
    write_json(path, estimates, "estimate export")
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to create {what} '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to write {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::domain::{EstimatorConfig, PointOutcome, SweepPoint, Trace};
    use crate::estimate::ResonanceEstimator;

    fn sweep() -> SweepResult {
        let now = Local::now();
        SweepResult {
            points: vec![
                SweepPoint {
                    frequency: 1700.0,
                    outcome: PointOutcome::Averaged { signal: 0.25 },
                },
                SweepPoint {
                    frequency: 1700.1,
                    outcome: PointOutcome::Failed {
                        reason: "malformed reply".into(),
                    },
                },
            ],
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn run_record_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let record = RunRecord::new("simulation", &SweepConfig::default(), &sweep());
        write_run_json(&path, &record).unwrap();

        let loaded = read_run_json(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.successful_points, 1);
        assert_eq!(loaded.failed_frequencies, vec![1700.1]);
    }

    #[test]
    fn estimate_export_lists_all_methods() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("estimates.json");
        let trace = Trace::new(
            (0..20).map(|i| 1700.0 + i as f64).collect(),
            (0..20).map(|i| if i == 9 { 1.0 } else { 0.0 }).collect(),
        )
        .unwrap();
        let config = EstimatorConfig {
            smoothing: None,
            ..EstimatorConfig::default()
        };
        let report = ResonanceEstimator::new(config).unwrap().analyze(&trace);
        let export = EstimateFile::from_report("unit", trace.len(), &report);
        write_estimates_json(&path, &export).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let estimates = json["estimates"].as_array().unwrap();
        assert_eq!(estimates.len(), 3);
        assert_eq!(estimates[0]["method"], "extremum");
        assert_eq!(estimates[0]["estimate"]["status"], "found");
        assert_eq!(estimates[0]["estimate"]["frequency"], 1709.0);
        assert_eq!(estimates[2]["method"], "peak_detection");
    }
}
