//! The saturating "photocurve" calibration model and its inverse.
//!
//! Forward (bright-end saturation of the instrumental scale):
//!
//! ```text
//! m_cat = a0·log10(10^(a1·(m − a2)) + 1) + a3
//! ```
//!
//! Inverse (the same curve with input and output exchanged):
//!
//! ```text
//! m_cat = (1/a1)·log10(10^((m − a3)/a0) − 1) + a2
//! ```
//!
//! Numerical notes:
//! - `log10(10^z + 1)` overflows for large `z` if computed literally; we use
//!   `z + log10(1 + 10^-z)` for `z > 0` and `ln_1p` for the small term.
//! - `log10(10^w − 1)` is defined only for `w > 0`; it is `−∞` at `w = 0` and
//!   NaN below, which is how a non-converging inverse fit announces itself.
//! - `10^z / (10^z + 1)` is the base-10 logistic; evaluated from whichever
//!   side keeps the exponent negative.

use std::f64::consts::LN_10;

use nalgebra::{DMatrix, DVector};

use crate::domain::{ModelTag, PhotocurveParams};
use crate::math::LeastSquaresProblem;

/// `log10(10^z + 1)` without overflow.
pub fn log10_1p_exp10(z: f64) -> f64 {
    if z > 0.0 {
        z + (10f64.powf(-z)).ln_1p() / LN_10
    } else {
        (10f64.powf(z)).ln_1p() / LN_10
    }
}

/// `log10(10^w − 1)`; NaN for `w < 0`, `−∞` at `w = 0`.
pub fn log10_expm1_10(w: f64) -> f64 {
    if w.is_nan() || w < 0.0 {
        return f64::NAN;
    }
    w + (-(10f64.powf(-w))).ln_1p() / LN_10
}

/// `10^z / (10^z + 1)`.
fn logistic10(z: f64) -> f64 {
    if z > 0.0 {
        1.0 / (1.0 + 10f64.powf(-z))
    } else {
        let e = 10f64.powf(z);
        e / (1.0 + e)
    }
}

/// `10^w / (10^w − 1)` for `w > 0`.
fn inverse_ratio10(w: f64) -> f64 {
    1.0 / (1.0 - 10f64.powf(-w))
}

pub fn eval_forward(mag: f64, p: &PhotocurveParams) -> f64 {
    p.a0 * log10_1p_exp10(p.a1 * (mag - p.a2)) + p.a3
}

pub fn eval_inverse(mag: f64, p: &PhotocurveParams) -> f64 {
    log10_expm1_10((mag - p.a3) / p.a0) / p.a1 + p.a2
}

/// Closed-form evaluation of either branch.
///
/// Tags other than the two photocurve tags evaluate the forward branch.
pub fn eval_photocurve(mag: f64, p: &PhotocurveParams, tag: ModelTag) -> f64 {
    match tag {
        ModelTag::InversePhotocurve => eval_inverse(mag, p),
        _ => eval_forward(mag, p),
    }
}

/// Which branch a [`PhotocurveProblem`] fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Forward,
    Inverse,
}

/// Error-weighted residuals `(f(x_i) − y_i)/σ_i` for one photocurve branch.
pub struct PhotocurveProblem<'a> {
    pub branch: Branch,
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub err: &'a [f64],
}

impl LeastSquaresProblem for PhotocurveProblem<'_> {
    fn n_params(&self) -> usize {
        4
    }

    fn n_residuals(&self) -> usize {
        self.x.len()
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let p = PhotocurveParams::from_slice(params.as_slice());
        for i in 0..self.x.len() {
            let f = match self.branch {
                Branch::Forward => eval_forward(self.x[i], &p),
                Branch::Inverse => eval_inverse(self.x[i], &p),
            };
            out[i] = (f - self.y[i]) / self.err[i];
        }
    }

    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>) {
        let p = PhotocurveParams::from_slice(params.as_slice());
        for i in 0..self.x.len() {
            let x = self.x[i];
            let s = self.err[i];
            match self.branch {
                Branch::Forward => {
                    let z = p.a1 * (x - p.a2);
                    let g = logistic10(z);
                    out[(i, 0)] = log10_1p_exp10(z) / s;
                    out[(i, 1)] = p.a0 * g * (x - p.a2) / s;
                    out[(i, 2)] = -p.a0 * g * p.a1 / s;
                    out[(i, 3)] = 1.0 / s;
                }
                Branch::Inverse => {
                    let w = (x - p.a3) / p.a0;
                    let q = inverse_ratio10(w);
                    out[(i, 0)] = -q * (x - p.a3) / (p.a1 * p.a0 * p.a0) / s;
                    out[(i, 1)] = -log10_expm1_10(w) / (p.a1 * p.a1) / s;
                    out[(i, 2)] = 1.0 / s;
                    out[(i, 3)] = -q / (p.a1 * p.a0) / s;
                }
            }
        }
    }
}
