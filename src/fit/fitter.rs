//! Low-level fitting routines for a single calibration family.
//!
//! Given parallel arrays of instrumental magnitudes `x_i`, catalog magnitudes
//! `y_i` and instrumental errors `σ_i`, each routine returns the fitted
//! [`CalibrationModel`] plus its unweighted residual sum of squares. The
//! selection policy (which family, small-sample shortcuts, validation) lives
//! in [`crate::fit::selection`].

use crate::domain::{CalibrationModel, ControlPoint, FitConfig, ModelTag};
use crate::error::{CalibError, Result};
use crate::fit::photocurve::fit_photocurve;
use crate::math::{robustlinefit, weighted_zeropoint, wlinearfit, wpolyfit};
use crate::models::evaluate;

/// A single concrete calibration family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Linear,
    Zeropoint,
    RobustLinear,
    Photocurve,
    Parabola,
}

impl Family {
    pub fn display_name(self) -> &'static str {
        match self {
            Family::Linear => "linear",
            Family::Zeropoint => "zero-point",
            Family::RobustLinear => "robust linear",
            Family::Photocurve => "photocurve",
            Family::Parabola => "parabola",
        }
    }
}

/// Which errors a fit is weighted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// `1/σ_i²` from the control points.
    Measured,
    /// `σ_i = 1` for every point; used to compare families on equal terms.
    Unit,
}

/// Best fit for a single family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyFit {
    pub family: Family,
    pub model: CalibrationModel,
    /// `Σ (model(x_i) − y_i)²`, unweighted.
    pub rss: f64,
    /// Random restarts spent (photocurve only).
    pub restarts: usize,
}

/// Control points split into the three arrays the backends take.
#[derive(Debug, Clone, Default)]
pub struct ControlArrays {
    pub inst: Vec<f64>,
    pub cat: Vec<f64>,
    pub err: Vec<f64>,
}

impl ControlArrays {
    pub fn from_points(points: &[ControlPoint]) -> Self {
        Self {
            inst: points.iter().map(|p| p.instrumental_magnitude).collect(),
            cat: points.iter().map(|p| p.catalog_magnitude).collect(),
            err: points.iter().map(|p| p.instrumental_magnitude_error).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inst.is_empty()
    }
}

/// Fit one family to the control points.
pub fn fit_family(
    family: Family,
    data: &ControlArrays,
    weighting: Weighting,
    config: &FitConfig,
) -> Result<FamilyFit> {
    if data.is_empty() {
        return Err(CalibError::input("no control points to fit"));
    }

    let unit;
    let err: &[f64] = match weighting {
        Weighting::Measured => &data.err,
        Weighting::Unit => {
            unit = vec![1.0; data.len()];
            &unit
        }
    };
    let (x, y) = (&data.inst[..], &data.cat[..]);

    let mut restarts = 0;
    let model = match family {
        Family::Linear => {
            let fit = wlinearfit(x, y, err)?;
            CalibrationModel::Linear {
                slope: fit.b,
                intercept: fit.c,
            }
        }
        Family::Parabola => {
            let fit = wpolyfit(x, y, err)?;
            CalibrationModel::Parabola {
                a: fit.a,
                b: fit.b,
                c: fit.c,
            }
        }
        Family::Zeropoint => {
            let fit = weighted_zeropoint(x, y, err)?;
            CalibrationModel::Zeropoint { offset: fit.offset }
        }
        Family::RobustLinear => {
            let fit = robustlinefit(x, y)?;
            CalibrationModel::RobustLinear {
                slope: fit.slope,
                intercept: fit.intercept,
            }
        }
        Family::Photocurve => {
            let fit = fit_photocurve(x, y, err, config)?;
            restarts = fit.restarts;
            match fit.tag {
                ModelTag::InversePhotocurve => CalibrationModel::InversePhotocurve(fit.params),
                _ => CalibrationModel::Photocurve(fit.params),
            }
        }
    };

    let rss = residual_sum_of_squares(&model, x, y);
    log::debug!("{} fit: rss {rss:.6} over {} points", family.display_name(), x.len());

    Ok(FamilyFit {
        family,
        model,
        rss,
        restarts,
    })
}

/// `Σ (model(x_i) − y_i)²`. NaN if the model is undefined at any `x_i`.
pub fn residual_sum_of_squares(model: &CalibrationModel, x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = evaluate(model, xi) - yi;
            r * r
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrays(x: &[f64], y: &[f64], e: f64) -> ControlArrays {
        ControlArrays {
            inst: x.to_vec(),
            cat: y.to_vec(),
            err: vec![e; x.len()],
        }
    }

    #[test]
    fn linear_family_maps_to_linear_model() {
        let x: Vec<f64> = (0..10).map(|i| 10.0 + i as f64 * 0.3).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.02 * v - 0.4).collect();
        let fit = fit_family(Family::Linear, &arrays(&x, &y, 0.02), Weighting::Measured, &FitConfig::default())
            .unwrap();
        match fit.model {
            CalibrationModel::Linear { slope, intercept } => {
                assert!((slope - 1.02).abs() < 1e-9);
                assert!((intercept + 0.4).abs() < 1e-8);
            }
            other => panic!("unexpected model {other:?}"),
        }
        assert!(fit.rss < 1e-16);
    }

    #[test]
    fn unit_weighting_ignores_measured_errors() {
        let x = [10.0, 11.0, 12.0, 13.0];
        let y = [12.0, 13.0, 14.0, 16.0];
        let data = ControlArrays {
            inst: x.to_vec(),
            cat: y.to_vec(),
            err: vec![0.01, 0.01, 0.01, 100.0],
        };
        let config = FitConfig::default();
        let measured = fit_family(Family::Zeropoint, &data, Weighting::Measured, &config).unwrap();
        let unit = fit_family(Family::Zeropoint, &data, Weighting::Unit, &config).unwrap();

        let CalibrationModel::Zeropoint { offset: m } = measured.model else {
            panic!("expected zero-point");
        };
        let CalibrationModel::Zeropoint { offset: u } = unit.model else {
            panic!("expected zero-point");
        };
        assert!((m - 2.0).abs() < 1e-3);
        assert!((u - 2.25).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_an_error() {
        let res = fit_family(
            Family::Parabola,
            &ControlArrays::default(),
            Weighting::Measured,
            &FitConfig::default(),
        );
        assert!(matches!(res, Err(CalibError::Input(_))));
    }

    #[test]
    fn rss_is_nan_where_model_is_undefined() {
        let model = CalibrationModel::InversePhotocurve(crate::domain::PhotocurveParams {
            a0: 1.0,
            a1: 1.0,
            a2: 10.0,
            a3: 12.0,
        });
        assert!(residual_sum_of_squares(&model, &[11.0, 13.0], &[11.0, 13.0]).is_nan());
    }
}
