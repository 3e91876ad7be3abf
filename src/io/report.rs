//! Read/write fit report JSON files.
//!
//! The report is the machine-readable companion of the parameter file:
//! - chosen model (with all coefficients) and its numeric tag
//! - number of control points, residual sum of squares, candidate scores
//! - the fitted instrumental range and a precomputed calibration grid

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{CalibrationModel, FitMode};
use crate::error::{CalibError, Result};
use crate::fit::FitSelection;
use crate::models::evaluate;

const GRID_POINTS: usize = 51;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub family: String,
    pub rss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationGrid {
    pub instrumental: Vec<f64>,
    pub calibrated: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub tool: String,
    pub mode: FitMode,
    pub model: CalibrationModel,
    pub model_tag: u8,
    pub n_points: usize,
    pub rss: f64,
    pub instrumental_range: (f64, f64),
    pub candidates: Vec<CandidateEntry>,
    pub photocurve_restarts: usize,
    pub grid: CalibrationGrid,
}

impl FitReport {
    pub fn from_selection(sel: &FitSelection) -> Self {
        Self {
            tool: "magcal".to_string(),
            mode: sel.mode,
            model: sel.model,
            model_tag: sel.model.tag().value(),
            n_points: sel.n,
            rss: sel.rss,
            instrumental_range: sel.range,
            candidates: sel
                .candidates
                .iter()
                .map(|c| CandidateEntry {
                    family: c.family.to_string(),
                    rss: c.rss,
                })
                .collect(),
            photocurve_restarts: sel.restarts,
            grid: build_grid(&sel.model, sel.range, GRID_POINTS),
        }
    }
}

/// Write a fit report JSON file.
pub fn write_fit_report(path: &Path, sel: &FitSelection) -> Result<()> {
    let file = File::create(path).map_err(|e| CalibError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &FitReport::from_selection(sel))
        .map_err(|e| CalibError::input(format!("Failed to write fit report '{}': {e}", path.display())))?;
    log::info!("Fit report written to {}", path.display());
    Ok(())
}

/// Read a fit report JSON file.
#[cfg(test)]
pub(crate) fn read_fit_report(path: &Path) -> Result<FitReport> {
    let file = File::open(path).map_err(|e| CalibError::io(path, e))?;
    serde_json::from_reader(file)
        .map_err(|e| CalibError::input(format!("Invalid fit report '{}': {e}", path.display())))
}

fn build_grid(model: &CalibrationModel, range: (f64, f64), n: usize) -> CalibrationGrid {
    let n = n.max(2);
    let (lo, hi) = range;
    let mut instrumental = Vec::with_capacity(n);
    let mut calibrated = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let m = lo + u * (hi - lo);
        instrumental.push(m);
        calibrated.push(evaluate(model, m));
    }
    CalibrationGrid {
        instrumental,
        calibrated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::CandidateScore;

    #[test]
    fn report_round_trips_through_json() {
        let sel = FitSelection {
            model: CalibrationModel::Parabola { a: 0.01, b: 0.9, c: 2.0 },
            mode: FitMode::Auto,
            n: 42,
            rss: 0.125,
            range: (9.0, 14.0),
            candidates: vec![
                CandidateScore {
                    family: "photocurve",
                    rss: None,
                },
                CandidateScore {
                    family: "parabola",
                    rss: Some(0.125),
                },
            ],
            restarts: 0,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_fit_report(&path, &sel).unwrap();

        let report = read_fit_report(&path).unwrap();
        assert_eq!(report.mode, FitMode::Auto);
        assert_eq!(report.model, sel.model);
        assert_eq!(report.n_points, 42);
        assert_eq!(report.candidates[0].rss, None);
        assert_eq!(report.candidates[1].family, "parabola");
        assert_eq!(report.model_tag, 2);
        assert_eq!(report.grid.instrumental.len(), GRID_POINTS);
        assert_eq!(report.grid.instrumental[0], 9.0);
        assert!((report.grid.calibrated[0] - (0.81 + 8.1 + 2.0)).abs() < 1e-12);
    }
}
