//! Evaluation of a fitted `CalibrationModel`.
//!
//! The bulk application and the driver's validation rely on two primitive
//! operations:
//! - map an instrumental magnitude onto the catalog scale
//! - check the shape of the map over a magnitude range

use crate::domain::CalibrationModel;
use crate::models::photocurve::{eval_forward, eval_inverse};

/// Grid resolution used when checking monotonicity over a range.
const SHAPE_SAMPLES: usize = 200;

/// Map an instrumental magnitude onto the catalog scale.
pub fn evaluate(model: &CalibrationModel, mag: f64) -> f64 {
    match *model {
        CalibrationModel::Linear { slope, intercept }
        | CalibrationModel::RobustLinear { slope, intercept } => slope * mag + intercept,
        CalibrationModel::Zeropoint { offset } => mag + offset,
        CalibrationModel::Parabola { a, b, c } => (a * mag + b) * mag + c,
        CalibrationModel::Photocurve(ref p) => eval_forward(mag, p),
        CalibrationModel::InversePhotocurve(ref p) => eval_inverse(mag, p),
    }
}

/// First magnitude in `[lo, hi]` at which the calibrated value decreases.
///
/// Returns `None` if the model is non-decreasing (within a small tolerance)
/// over the whole range. A non-finite value counts as a violation.
pub fn first_decrease(model: &CalibrationModel, lo: f64, hi: f64) -> Option<f64> {
    // Tolerance: allow tiny numerical noise without rejecting.
    let eps = 1e-9_f64;

    if !(lo.is_finite() && hi.is_finite()) || hi < lo {
        return None;
    }
    let mut prev = evaluate(model, lo);
    if !prev.is_finite() {
        return Some(lo);
    }
    if hi == lo {
        return None;
    }

    for i in 1..SHAPE_SAMPLES {
        let u = i as f64 / (SHAPE_SAMPLES as f64 - 1.0);
        let m = lo + u * (hi - lo);
        let v = evaluate(model, m);
        if !v.is_finite() || v - prev < -eps {
            return Some(m);
        }
        prev = v;
    }
    None
}

/// True if every coefficient of the model is zero.
pub fn is_all_zero(model: &CalibrationModel) -> bool {
    model.coefficients().iter().all(|&c| c == 0.0)
}
