//! Calibration parameter file.
//!
//! A single line of five whitespace-separated numbers:
//!
//! ```text
//! model_tag a3 a2 a1 a0
//! ```
//!
//! Polynomial families store `tag 0 a b c` for `a·x² + b·x + c`; the
//! photocurves store their four coefficients in reverse order. Tag `3` is an
//! older zero-point spelling and reads back as [`CalibrationModel::Zeropoint`].

use std::fs;
use std::path::Path;

use crate::domain::{CalibrationModel, ModelTag, PhotocurveParams};
use crate::error::{CalibError, Result};
use crate::io::atomic::write_atomically;

/// Default parameter file name.
pub const DEFAULT_PARAM_FILE: &str = "calib.txt_param";

/// Legacy zero-point tag.
const LEGACY_ZEROPOINT_TAG: f64 = 3.0;

/// The flat record written to the parameter file.
pub fn to_record(model: &CalibrationModel) -> [f64; 5] {
    let [a3, a2, a1, a0] = model.coefficients();
    [f64::from(model.tag().value()), a3, a2, a1, a0]
}

/// Rebuild a model from the flat record.
pub fn from_record(record: [f64; 5]) -> std::result::Result<CalibrationModel, String> {
    let [tag, a3, a2, a1, a0] = record;
    if record.iter().any(|v| !v.is_finite()) {
        return Err("non-finite coefficient".to_string());
    }
    if tag == LEGACY_ZEROPOINT_TAG {
        return Ok(CalibrationModel::Zeropoint { offset: a0 });
    }
    let tag = ModelTag::from_value(tag).ok_or_else(|| format!("unknown model tag {tag}"))?;

    let model = match tag {
        ModelTag::Line => {
            if a2 != 0.0 {
                return Err(format!("line record has a quadratic term {a2}"));
            }
            CalibrationModel::Linear {
                slope: a1,
                intercept: a0,
            }
        }
        ModelTag::Parabola => CalibrationModel::Parabola { a: a2, b: a1, c: a0 },
        ModelTag::RobustLine => CalibrationModel::RobustLinear {
            slope: a1,
            intercept: a0,
        },
        ModelTag::Photocurve => CalibrationModel::Photocurve(PhotocurveParams { a0, a1, a2, a3 }),
        ModelTag::InversePhotocurve => {
            CalibrationModel::InversePhotocurve(PhotocurveParams { a0, a1, a2, a3 })
        }
    };
    Ok(model)
}

/// Format the record as stored on disk (with trailing newline).
pub fn format_param_line(model: &CalibrationModel) -> String {
    let [tag, a3, a2, a1, a0] = to_record(model);
    format!("{tag} {a3} {a2} {a1} {a0}\n")
}

/// Parse the first non-empty line of a parameter file.
pub fn parse_param_text(text: &str) -> std::result::Result<CalibrationModel, String> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| "file is empty".to_string())?;

    let values = line
        .split_whitespace()
        .map(|t| t.parse::<f64>().map_err(|_| format!("'{t}' is not a number")))
        .collect::<std::result::Result<Vec<f64>, String>>()?;
    let record: [f64; 5] = values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected 5 numbers, found {}", v.len()))?;
    from_record(record)
}

/// Write the calibration to `path`, replacing any previous content atomically.
pub fn write_param_file(path: &Path, model: &CalibrationModel) -> Result<()> {
    write_atomically(path, &format_param_line(model))?;
    log::info!("Calibration parameters written to {}", path.display());
    Ok(())
}

/// Read a calibration from `path`.
pub fn read_param_file(path: &Path) -> Result<CalibrationModel> {
    let text = fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
    parse_param_text(&text).map_err(|reason| CalibError::ParamFile {
        path: path.to_path_buf(),
        reason,
    })
}

/// Terminal output: `a b c` for polynomial families, `tag a0 a1 a2 a3` for the
/// photocurves.
pub fn format_for_cli(model: &CalibrationModel) -> String {
    match model {
        CalibrationModel::Photocurve(p) | CalibrationModel::InversePhotocurve(p) => format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            model.tag().value(),
            p.a0,
            p.a1,
            p.a2,
            p.a3
        ),
        _ => {
            let (a, b, c) = model.polynomial().unwrap_or((0.0, 0.0, 0.0));
            format!("{a:.6} {b:.6} {c:.6}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::evaluate;

    fn all_families() -> Vec<CalibrationModel> {
        let p = PhotocurveParams {
            a0: 0.31,
            a1: 1.07,
            a2: 9.25,
            a3: 10.125,
        };
        vec![
            CalibrationModel::Linear {
                slope: 0.987654321,
                intercept: 21.5,
            },
            CalibrationModel::Parabola {
                a: 1.5e-3,
                b: 0.95,
                c: 20.25,
            },
            CalibrationModel::RobustLinear {
                slope: 1.01,
                intercept: 19.75,
            },
            CalibrationModel::Photocurve(p),
            CalibrationModel::InversePhotocurve(p),
        ]
    }

    #[test]
    fn record_round_trips_for_each_tag() {
        for model in all_families() {
            let line = format_param_line(&model);
            assert_eq!(line.split_whitespace().count(), 5);
            assert_eq!(parse_param_text(&line).unwrap(), model, "{line}");
        }
    }

    #[test]
    fn zeropoint_is_stored_as_unit_slope_line() {
        let model = CalibrationModel::Zeropoint { offset: 2.5 };
        assert_eq!(format_param_line(&model), "1 0 0 1 2.5\n");
        let back = parse_param_text("1 0 0 1 2.5").unwrap();
        assert_eq!(evaluate(&back, 10.0), 12.5);
    }

    #[test]
    fn legacy_tag_three_reads_as_zeropoint() {
        let model = parse_param_text("3 0 0 1 -1.25\n").unwrap();
        assert_eq!(model, CalibrationModel::Zeropoint { offset: -1.25 });
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(parse_param_text("").is_err());
        assert!(parse_param_text("1 0 0 1").is_err());
        assert!(parse_param_text("1 0 0 1 2 3").is_err());
        assert!(parse_param_text("7 0 0 1 2").is_err());
        assert!(parse_param_text("1 0 x 1 2").is_err());
        assert!(parse_param_text("2 0 0 nan 2").is_err());
    }

    #[test]
    fn file_round_trip_and_error_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PARAM_FILE);
        let model = CalibrationModel::Parabola { a: 0.01, b: 0.9, c: 2.0 };
        write_param_file(&path, &model).unwrap();
        assert_eq!(read_param_file(&path).unwrap(), model);

        fs::write(&path, "garbage\n").unwrap();
        assert!(matches!(read_param_file(&path), Err(CalibError::ParamFile { .. })));
    }

    #[test]
    fn cli_format_by_family() {
        let line = CalibrationModel::Linear { slope: 1.0, intercept: 2.5 };
        assert_eq!(format_for_cli(&line), "0.000000 1.000000 2.500000");

        let p = PhotocurveParams {
            a0: 0.3,
            a1: 1.0,
            a2: 9.0,
            a3: 10.0,
        };
        assert_eq!(
            format_for_cli(&CalibrationModel::InversePhotocurve(p)),
            "5 0.300000 1.000000 9.000000 10.000000"
        );
    }
}
