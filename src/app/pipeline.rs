//! Shared calibration workflows behind the CLI subcommands.
//!
//! - fit: control points -> family selection -> validation -> parameter file
//! - apply: parameter file (or explicit model) -> every lightcurve -> summary log

use std::path::{Path, PathBuf};

use crate::apply::{apply_calibration_to_lightcurves, ApplyReport};
use crate::domain::{ApplyConfig, CalibrationModel, FitConfig, FitMode};
use crate::error::Result;
use crate::fit::{fit_and_select, FitSelection};
use crate::io::{read_control_points, write_fit_report, write_param_file};

/// Inputs of one `magcal fit` run.
#[derive(Debug, Clone)]
pub struct FitRequest {
    pub mode: FitMode,
    pub control_file: PathBuf,
    pub params_file: PathBuf,
    pub report_file: Option<PathBuf>,
    pub config: FitConfig,
}

/// Fit, validate and persist a calibration.
///
/// Nothing is written unless the fit succeeds.
pub fn run_fit(request: &FitRequest) -> Result<FitSelection> {
    let points = read_control_points(&request.control_file)?;
    let selection = fit_and_select(&points, request.mode, &request.config)?;

    write_param_file(&request.params_file, &selection.model)?;
    if let Some(path) = &request.report_file {
        write_fit_report(path, &selection)?;
    }
    Ok(selection)
}

/// Apply `model` to a lightcurve directory.
pub fn run_apply(
    model: &CalibrationModel,
    dir: &Path,
    config: &ApplyConfig,
    summary_log: Option<&Path>,
) -> Result<ApplyReport> {
    log::info!("Calibration: {} {:?}", model.display_name(), model.coefficients());
    apply_calibration_to_lightcurves(model, dir, config, summary_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalibError;
    use crate::io::read_param_file;
    use std::fs;

    #[test]
    fn fit_writes_param_file_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let control = dir.path().join("calib.txt");
        let mut text = String::new();
        for i in 0..10 {
            let inst = -12.0 + 0.4 * i as f64;
            text.push_str(&format!("{inst} {} 0.02\n", inst + 23.5));
        }
        fs::write(&control, text).unwrap();

        let request = FitRequest {
            mode: FitMode::Linear,
            control_file: control,
            params_file: dir.path().join("calib.txt_param"),
            report_file: Some(dir.path().join("fit.json")),
            config: FitConfig::default(),
        };
        let sel = run_fit(&request).unwrap();
        assert_eq!(sel.n, 10);

        let model = read_param_file(&request.params_file).unwrap();
        let (a, b, c) = model.polynomial().unwrap();
        assert_eq!(a, 0.0);
        assert!((b - 1.0).abs() < 1e-9);
        assert!((c - 23.5).abs() < 1e-8);
        assert!(dir.path().join("fit.json").exists());
    }

    #[test]
    fn empty_control_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let control = dir.path().join("calib.txt");
        fs::write(&control, "# no stars\n").unwrap();

        let request = FitRequest {
            mode: FitMode::Auto,
            control_file: control,
            params_file: dir.path().join("calib.txt_param"),
            report_file: None,
            config: FitConfig::default(),
        };
        assert!(matches!(run_fit(&request), Err(CalibError::Input(_))));
        assert!(!request.params_file.exists());
    }
}
