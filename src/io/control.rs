//! Control-point file reader.
//!
//! One star per line: `instrumental catalog [instrumental_error]`, whitespace
//! separated. Blank lines and `#` comments are skipped. A missing or
//! non-positive error is replaced by the smallest positive error seen so far
//! in the file, capped at [`DEFAULT_MAG_ERROR`].

use std::fs;
use std::path::Path;

use crate::domain::{ControlPoint, DEFAULT_MAG_ERROR};
use crate::error::{CalibError, Result};

/// Load control points from `path`. An empty set is an input error.
pub fn read_control_points(path: &Path) -> Result<Vec<ControlPoint>> {
    let text = fs::read_to_string(path)
        .map_err(|e| CalibError::input(format!("Failed to read control points '{}': {e}", path.display())))?;
    let points = parse_control_points(&text)
        .map_err(|e| CalibError::input(format!("{}: {e}", path.display())))?;
    if points.is_empty() {
        return Err(CalibError::input(format!(
            "No control points found in '{}'",
            path.display()
        )));
    }
    log::info!("Loaded {} control points from {}", points.len(), path.display());
    Ok(points)
}

/// Parse control-point text; errors carry the 1-based line number.
pub fn parse_control_points(text: &str) -> std::result::Result<Vec<ControlPoint>, String> {
    let mut points = Vec::new();
    let mut smallest_error: Option<f64> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let mut values = [0.0_f64; 3];
        let mut count = 0;
        for token in line.split_whitespace().take(3) {
            values[count] = token
                .parse::<f64>()
                .map_err(|_| format!("line {line_no}: '{token}' is not a number"))?;
            count += 1;
        }
        if count < 2 {
            return Err(format!("line {line_no}: expected 'instrumental catalog [error]'"));
        }
        let [inst, cat, err] = values;
        if !(inst.is_finite() && cat.is_finite() && err.is_finite()) {
            return Err(format!("line {line_no}: non-finite value"));
        }

        let err = if err > 0.0 {
            smallest_error = Some(smallest_error.map_or(err, |s| s.min(err)));
            err
        } else {
            smallest_error.map_or(DEFAULT_MAG_ERROR, |s| s.min(DEFAULT_MAG_ERROR))
        };

        points.push(ControlPoint {
            instrumental_magnitude: inst,
            catalog_magnitude: cat,
            instrumental_magnitude_error: err,
        });
    }

    Ok(points)
}
