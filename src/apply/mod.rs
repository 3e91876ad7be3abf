//! Bulk application of a calibration to every lightcurve in a directory.
//!
//! Each file is rewritten independently through [`AtomicRewrite`]:
//! - unparsable lines (comments, headers) are skipped
//! - records whose propagated error exceeds the ceiling are dropped
//! - a record calibrated outside the plausible magnitude range aborts the file;
//!   the partial output is kept as `<name>.tmp_emergency_stop_debug` and the
//!   original stays untouched
//!
//! Files are processed on the rayon pool; the first fatal I/O error fails the
//! whole batch.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::domain::{ApplyConfig, CalibrationModel};
use crate::error::{CalibError, Result};
use crate::io::{format_lightcurve_line, parse_lightcurve_line, update_limiting_mag, AtomicRewrite, DEFAULT_SUMMARY_LOG};

pub mod propagate;

pub use propagate::*;

/// Suffix of the partial output kept when a file is aborted.
pub const EMERGENCY_STOP_SUFFIX: &str = ".tmp_emergency_stop_debug";

/// Totals over one bulk application.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub files_processed: usize,
    pub aborted_files: Vec<PathBuf>,
    pub records_written: usize,
    pub records_dropped: usize,
    pub limiting_mag: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum FileOutcome {
    Rewritten { written: usize, dropped: usize },
    Aborted { debug_path: PathBuf, dropped: usize },
}

/// True for `out*.dat` names at least 8 characters long.
pub fn is_lightcurve_name(name: &str) -> bool {
    name.len() >= 8 && name.starts_with("out") && name.ends_with(".dat")
}

/// Lightcurve files in `dir`, sorted by name.
pub fn list_lightcurve_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| CalibError::input(format!("Cannot open lightcurve directory '{}': {e}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CalibError::io(dir, e))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name();
        if is_file && name.to_str().is_some_and(is_lightcurve_name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Apply `model` to every lightcurve file in `dir` and update the summary log.
///
/// `summary_log` defaults to `vast_summary.log` inside `dir`.
pub fn apply_calibration_to_lightcurves(
    model: &CalibrationModel,
    dir: &Path,
    config: &ApplyConfig,
    summary_log: Option<&Path>,
) -> Result<ApplyReport> {
    let files = list_lightcurve_files(dir)?;
    if files.is_empty() {
        log::warn!("No lightcurve files found in {}", dir.display());
    } else {
        log::info!(
            "Applying {} calibration to {} lightcurve files in {}",
            model.display_name(),
            files.len(),
            dir.display()
        );
    }

    let outcomes = files
        .par_iter()
        .map(|path| apply_to_file(model, path, config).map(|outcome| (path, outcome)))
        .collect::<Result<Vec<_>>>()?;

    let mut report = ApplyReport {
        files_processed: outcomes.len(),
        ..ApplyReport::default()
    };
    for (path, outcome) in outcomes {
        match outcome {
            FileOutcome::Rewritten { written, dropped } => {
                report.records_written += written;
                report.records_dropped += dropped;
            }
            FileOutcome::Aborted { debug_path, dropped } => {
                log::debug!("{} diverted to {}", path.display(), debug_path.display());
                report.records_dropped += dropped;
                report.aborted_files.push(path.clone());
            }
        }
    }

    let default_log;
    let log_path = match summary_log {
        Some(p) => p,
        None => {
            default_log = dir.join(DEFAULT_SUMMARY_LOG);
            &default_log
        }
    };
    report.limiting_mag = update_limiting_mag(log_path, model)?;

    log::info!(
        "Calibrated {} files ({} aborted): {} records written, {} dropped",
        report.files_processed,
        report.aborted_files.len(),
        report.records_written,
        report.records_dropped
    );
    Ok(report)
}

fn apply_to_file(model: &CalibrationModel, path: &Path, config: &ApplyConfig) -> Result<FileOutcome> {
    // Invalid UTF-8 fails the file rather than being rewritten lossily.
    let text = fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;

    let mut rewrite = AtomicRewrite::begin(path)?;
    let mut written = 0usize;
    let mut dropped = 0usize;

    for line in text.lines() {
        let Some(mut point) = parse_lightcurve_line(line) else {
            continue;
        };
        match judge(model, point.magnitude, point.magnitude_error, config) {
            Verdict::Keep(c) => {
                point.magnitude = c.magnitude;
                point.magnitude_error = c.error;
                writeln!(rewrite.writer(), "{}", format_lightcurve_line(&point))
                    .map_err(|e| CalibError::io(path, e))?;
                written += 1;
            }
            Verdict::Drop(_) => dropped += 1,
            Verdict::OutOfRange(c) => {
                let debug_path = emergency_stop_path(path);
                log::error!(
                    "{}: calibrated magnitude {:.4} (from {:.4}) is outside [{}, {}], keeping the original file; partial output in {}",
                    path.display(),
                    c.magnitude,
                    point.magnitude,
                    config.brightest,
                    config.faintest,
                    debug_path.display()
                );
                rewrite.divert(&debug_path)?;
                return Ok(FileOutcome::Aborted { debug_path, dropped });
            }
        }
    }

    rewrite.commit()?;
    Ok(FileOutcome::Rewritten { written, dropped })
}

/// `<file name>.tmp_emergency_stop_debug` next to `path`.
pub fn emergency_stop_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(EMERGENCY_STOP_SUFFIX);
    path.with_file_name(name)
}
