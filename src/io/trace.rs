//! Trace CSV read/write.
//!
//! Layout: a header row, then one row per successful sweep point in
//! ascending frequency.
//!
//! ```text
//! Frequency,Signal[,SmoothedSignal]
//! 1700.0,0.0123[,0.0119]
//! ```
//!
//! The reader also accepts the older `Frequency (MHz)` header. Rows that do
//! not parse are collected as row errors and skipped.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;

use crate::domain::Trace;
use crate::error::{AppError, EXIT_INSUFFICIENT_DATA, EXIT_USAGE};

#[derive(Debug, Serialize)]
struct TraceRow {
    #[serde(rename = "Frequency")]
    frequency: f64,
    #[serde(rename = "Signal")]
    signal: f64,
}

#[derive(Debug, Serialize)]
struct SmoothedTraceRow {
    #[serde(rename = "Frequency")]
    frequency: f64,
    #[serde(rename = "Signal")]
    signal: f64,
    #[serde(rename = "SmoothedSignal")]
    smoothed: f64,
}

/// A row that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the file.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedTrace {
    pub trace: Trace,
    /// Present when the file carried a `SmoothedSignal` column.
    pub smoothed: Option<Vec<f64>>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Write `trace`, optionally with a smoothed column of the same length.
pub fn write_trace_csv(path: &Path, trace: &Trace, smoothed: Option<&[f64]>) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to create trace CSV '{}': {e}", path.display())))?;
    let row_err = |e: csv::Error| AppError::new(EXIT_USAGE, format!("Failed to write trace CSV row: {e}"));

    let rows = trace.frequencies().iter().zip(trace.signal());
    match smoothed {
        Some(s) => {
            if s.len() != trace.len() {
                return Err(AppError::new(
                    EXIT_USAGE,
                    format!("Smoothed column has {} values for {} points.", s.len(), trace.len()),
                ));
            }
            for ((&frequency, &signal), &smoothed) in rows.zip(s) {
                writer
                    .serialize(SmoothedTraceRow {
                        frequency,
                        signal,
                        smoothed,
                    })
                    .map_err(row_err)?;
            }
        }
        None => {
            for (&frequency, &signal) in rows {
                writer.serialize(TraceRow { frequency, signal }).map_err(row_err)?;
            }
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to write trace CSV: {e}")))
}

/// Load a trace CSV.
pub fn read_trace_csv(path: &Path) -> Result<LoadedTrace, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to open trace CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns = resolve_columns(&headers)?;

    let mut frequencies = Vec::new();
    let mut signal = Vec::new();
    let mut smoothed = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &columns));
        match parsed {
            Ok((f, y, s)) => {
                frequencies.push(f);
                signal.push(y);
                if let Some(s) = s {
                    smoothed.push(s);
                }
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if frequencies.is_empty() {
        return Err(AppError::new(
            EXIT_INSUFFICIENT_DATA,
            format!("No usable rows in '{}'.", path.display()),
        ));
    }

    let trace = Trace::new(frequencies, signal)?;
    let smoothed = columns.smoothed.map(|_| smoothed);
    Ok(LoadedTrace {
        trace,
        smoothed,
        row_errors,
        rows_read,
    })
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    frequency: usize,
    signal: usize,
    smoothed: Option<usize>,
}

fn resolve_columns(headers: &StringRecord) -> Result<Columns, AppError> {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();

    let find = |names: &[&str]| names.iter().find_map(|n| map.get(*n).copied());
    let frequency = find(&["frequency", "frequency (mhz)", "frequency_mhz"])
        .ok_or_else(|| AppError::new(EXIT_USAGE, "Trace CSV has no 'Frequency' column."))?;
    let signal =
        find(&["signal"]).ok_or_else(|| AppError::new(EXIT_USAGE, "Trace CSV has no 'Signal' column."))?;
    let smoothed = find(&["smoothedsignal", "smoothed_signal"]);

    Ok(Columns {
        frequency,
        signal,
        smoothed,
    })
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<(f64, f64, Option<f64>), String> {
    let field = |idx: usize, label: &str| -> Result<f64, String> {
        let raw = record.get(idx).ok_or_else(|| format!("missing {label}"))?;
        let value: f64 = raw.parse().map_err(|_| format!("invalid {label} '{raw}'"))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("non-finite {label}"))
        }
    };

    let frequency = field(columns.frequency, "frequency")?;
    let signal = field(columns.signal, "signal")?;
    let smoothed = columns.smoothed.map(|idx| field(idx, "smoothed signal")).transpose()?;
    Ok((frequency, signal, smoothed))
}
