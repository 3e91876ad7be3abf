//! Project summary log: the reference-image limiting magnitude line.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::CalibrationModel;
use crate::error::{CalibError, Result};
use crate::io::atomic::AtomicRewrite;
use crate::models::evaluate;

/// Default summary log name inside the lightcurve directory.
pub const DEFAULT_SUMMARY_LOG: &str = "vast_summary.log";

const LIMITING_MAG_PREFIX: &str = "Estimated ref. image limiting mag.:";

/// Parse the limiting magnitude from a summary log, if present.
pub fn find_limiting_mag(text: &str) -> Option<f64> {
    text.lines().find_map(parse_limiting_mag_line)
}

fn parse_limiting_mag_line(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once(LIMITING_MAG_PREFIX)?;
    rest.split_whitespace().next()?.parse::<f64>().ok()
}

/// Replace the limiting magnitude line with `value`. Returns `None` if the
/// text has no such line.
pub fn replace_limiting_mag(text: &str, value: f64) -> Option<String> {
    let mut found = false;
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.split_inclusive('\n') {
        if !found && parse_limiting_mag_line(line).is_some() {
            found = true;
            out.push_str(&format!("{LIMITING_MAG_PREFIX} {value:.2}"));
            if line.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(line);
        }
    }
    found.then_some(out)
}

/// Map the logged limiting magnitude through `model` and rewrite the log.
///
/// Returns the new limiting magnitude. A missing log, a missing line or a
/// non-finite calibrated value only produce a warning.
pub fn update_limiting_mag(path: &Path, model: &CalibrationModel) -> Result<Option<f64>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Cannot read summary log {}: {e}", path.display());
            return Ok(None);
        }
    };
    let Some(old) = find_limiting_mag(&text) else {
        log::warn!("No limiting magnitude line in {}", path.display());
        return Ok(None);
    };
    let new = evaluate(model, old);
    if !new.is_finite() {
        log::warn!("Calibrated limiting magnitude is not finite (from {old}), leaving {} unchanged", path.display());
        return Ok(None);
    }
    let Some(updated) = replace_limiting_mag(&text, new) else {
        return Ok(None);
    };

    let mut rewrite = AtomicRewrite::begin(path)?;
    rewrite
        .writer()
        .write_all(updated.as_bytes())
        .map_err(|e| CalibError::io(path, e))?;
    rewrite.commit()?;
    log::info!("Reference image limiting magnitude {old:.2} -> {new:.2}");
    Ok(Some(new))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "Images used for photometry 120\nEstimated ref. image limiting mag.: -4.50\nJD range 2459000.1 2459010.9\n";

    #[test]
    fn finds_and_replaces_line() {
        assert_eq!(find_limiting_mag(LOG), Some(-4.5));
        let out = replace_limiting_mag(LOG, 17.254).unwrap();
        assert_eq!(
            out,
            "Images used for photometry 120\nEstimated ref. image limiting mag.: 17.25\nJD range 2459000.1 2459010.9\n"
        );
        assert!(replace_limiting_mag("nothing\n", 1.0).is_none());
    }

    #[test]
    fn update_rewrites_log_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SUMMARY_LOG);
        fs::write(&path, LOG).unwrap();

        let model = CalibrationModel::Zeropoint { offset: 21.0 };
        let new = update_limiting_mag(&path, &model).unwrap();
        assert_eq!(new, Some(16.5));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Estimated ref. image limiting mag.: 16.50\n"));
        assert!(text.starts_with("Images used for photometry 120\n"));
    }

    #[test]
    fn missing_log_or_line_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = CalibrationModel::IDENTITY;
        assert_eq!(update_limiting_mag(&dir.path().join("absent.log"), &model).unwrap(), None);

        let path = dir.path().join(DEFAULT_SUMMARY_LOG);
        fs::write(&path, "no such line\n").unwrap();
        assert_eq!(update_limiting_mag(&path, &model).unwrap(), None);
        assert_eq!(fs::read_to_string(&path).unwrap(), "no such line\n");
    }
}
