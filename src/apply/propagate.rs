//! Magnitude and error propagation through a calibration.

use crate::domain::{ApplyConfig, CalibrationModel};
use crate::models::evaluate;

/// A record after calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrated {
    pub magnitude: f64,
    pub error: f64,
}

/// What to do with one calibrated record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Keep(Calibrated),
    /// Propagated error above the ceiling; drop silently.
    Drop(Calibrated),
    /// Calibrated magnitude outside the plausible range; abort the file.
    OutOfRange(Calibrated),
}

/// Calibrate `mag ± err`.
///
/// The new error is half the span between the calibrated `mag + err` and
/// `mag − err`. If only one bound is finite its distance from the calibrated
/// magnitude is used; if neither is, the size of the magnitude shift is.
pub fn propagate(model: &CalibrationModel, mag: f64, err: f64) -> Calibrated {
    let magnitude = evaluate(model, mag);
    let hi = evaluate(model, mag + err);
    let lo = evaluate(model, mag - err);

    let error = match (hi.is_finite(), lo.is_finite()) {
        (true, true) => (hi - lo).abs() / 2.0,
        (true, false) => (hi - magnitude).abs(),
        (false, true) => (magnitude - lo).abs(),
        (false, false) => (magnitude - mag).abs(),
    };
    Calibrated { magnitude, error }
}

/// Calibrate one record and classify it against the configured limits.
///
/// The error ceiling is checked first: a noisy record is dropped even when
/// its magnitude is also out of range. A non-finite magnitude always aborts.
pub fn judge(model: &CalibrationModel, mag: f64, err: f64, config: &ApplyConfig) -> Verdict {
    let c = propagate(model, mag, err);
    if c.magnitude.is_finite() && !(c.error <= config.max_mag_error) {
        return Verdict::Drop(c);
    }
    let in_range = c.magnitude.is_finite() && c.magnitude >= config.brightest && c.magnitude <= config.faintest;
    if in_range { Verdict::Keep(c) } else { Verdict::OutOfRange(c) }
}
