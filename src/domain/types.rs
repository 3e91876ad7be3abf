//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed between the fit backends and the driver
//! - written to the fit report (JSON)
//! - converted to/from the flat parameter record at the I/O boundary

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Typical CCD photometry error (mag) assumed when a control point carries none.
pub const DEFAULT_MAG_ERROR: f64 = 0.03;

/// Below this many control points only a zero-point (or robust line) is fitted.
pub const MIN_STARS_FOR_LINE: usize = 5;

/// Below this many control points `auto` never tries curved models.
pub const MIN_STARS_FOR_POLY: usize = 40;

/// One calibration star: instrumental vs catalog magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub instrumental_magnitude: f64,
    pub catalog_magnitude: f64,
    /// Always `> 0` once loaded.
    pub instrumental_magnitude_error: f64,
}

/// One lightcurve measurement (one star, one epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightcurvePoint {
    pub julian_date: f64,
    pub magnitude: f64,
    pub magnitude_error: f64,
    pub x_pix: f64,
    pub y_pix: f64,
    pub aperture: f64,
    pub source_filename: String,
    /// Free text after the source file name; may be empty.
    pub comment: String,
}

/// Numeric model tag used by the parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTag {
    Line = 1,
    Parabola = 2,
    Photocurve = 4,
    InversePhotocurve = 5,
    RobustLine = 6,
}

impl ModelTag {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Parse a tag as stored in the parameter file.
    ///
    /// Tag `3` (zero-point) is an older spelling of a unit-slope line and is
    /// resolved by the caller, so it is not accepted here.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.fract() != 0.0 {
            return None;
        }
        match value as i64 {
            1 => Some(ModelTag::Line),
            2 => Some(ModelTag::Parabola),
            4 => Some(ModelTag::Photocurve),
            5 => Some(ModelTag::InversePhotocurve),
            6 => Some(ModelTag::RobustLine),
            _ => None,
        }
    }

    /// The photocurve branch with the roles of input and output swapped.
    #[cfg(test)]
    pub(crate) fn opposite(self) -> Self {
        match self {
            ModelTag::Photocurve => ModelTag::InversePhotocurve,
            ModelTag::InversePhotocurve => ModelTag::Photocurve,
            other => other,
        }
    }
}

/// Coefficients of the saturating "photocurve" model.
///
/// Forward: `m_cat = a0·log10(10^(a1·(m − a2)) + 1) + a3`
/// Inverse: `m_cat = (1/a1)·log10(10^((m − a3)/a0) − 1) + a2`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotocurveParams {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
}

impl PhotocurveParams {
    pub fn from_slice(p: &[f64]) -> Self {
        Self {
            a0: p[0],
            a1: p[1],
            a2: p[2],
            a3: p[3],
        }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.a0, self.a1, self.a2, self.a3]
    }
}

/// A fitted magnitude calibration. Exactly one family is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum CalibrationModel {
    Linear { slope: f64, intercept: f64 },
    Zeropoint { offset: f64 },
    Parabola { a: f64, b: f64, c: f64 },
    RobustLinear { slope: f64, intercept: f64 },
    Photocurve(PhotocurveParams),
    InversePhotocurve(PhotocurveParams),
}

impl CalibrationModel {
    /// The identity transform (`a = 0, b = 1, c = 0`).
    pub const IDENTITY: CalibrationModel = CalibrationModel::Linear {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn tag(&self) -> ModelTag {
        match self {
            CalibrationModel::Linear { .. } | CalibrationModel::Zeropoint { .. } => ModelTag::Line,
            CalibrationModel::Parabola { .. } => ModelTag::Parabola,
            CalibrationModel::RobustLinear { .. } => ModelTag::RobustLine,
            CalibrationModel::Photocurve(_) => ModelTag::Photocurve,
            CalibrationModel::InversePhotocurve(_) => ModelTag::InversePhotocurve,
        }
    }

    /// Human-readable label for log output.
    pub fn display_name(&self) -> &'static str {
        match self {
            CalibrationModel::Linear { .. } => "linear",
            CalibrationModel::Zeropoint { .. } => "zero-point",
            CalibrationModel::Parabola { .. } => "parabola",
            CalibrationModel::RobustLinear { .. } => "robust linear",
            CalibrationModel::Photocurve(_) => "photocurve",
            CalibrationModel::InversePhotocurve(_) => "inverse photocurve",
        }
    }

    /// Polynomial view `(a, b, c)` of `a·x² + b·x + c`, if this is a polynomial family.
    pub fn polynomial(&self) -> Option<(f64, f64, f64)> {
        match *self {
            CalibrationModel::Linear { slope, intercept }
            | CalibrationModel::RobustLinear { slope, intercept } => Some((0.0, slope, intercept)),
            CalibrationModel::Zeropoint { offset } => Some((0.0, 1.0, offset)),
            CalibrationModel::Parabola { a, b, c } => Some((a, b, c)),
            CalibrationModel::Photocurve(_) | CalibrationModel::InversePhotocurve(_) => None,
        }
    }

    /// All coefficients in parameter-record order (`a3, a2, a1, a0`).
    pub fn coefficients(&self) -> [f64; 4] {
        match self {
            CalibrationModel::Photocurve(p) | CalibrationModel::InversePhotocurve(p) => {
                [p.a3, p.a2, p.a1, p.a0]
            }
            _ => {
                let (a, b, c) = self.polynomial().unwrap_or((0.0, 0.0, 0.0));
                [0.0, a, b, c]
            }
        }
    }
}

/// Non-interactive fit entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Weighted straight line.
    Linear,
    /// Unit slope, weighted zero-point offset only.
    Zeropoint,
    /// Outlier-resistant (bisquare) straight line, unweighted.
    RobustLinear,
    /// Photocurve or inverse photocurve, whichever fits better.
    Photocurve,
    /// Weighted parabola.
    Parabola,
    /// Choose the family from the number of control points.
    Auto,
}

/// Levenberg–Marquardt stopping rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmSettings {
    pub max_iterations: usize,
    /// Relative parameter-step tolerance.
    pub xtol_rel: f64,
    /// Absolute parameter-step tolerance.
    pub xtol_abs: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol_rel: 1e-5,
            xtol_abs: 1e-5,
        }
    }
}

/// Fit configuration, derived from CLI flags (plus defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    pub lm: LmSettings,
    /// Random restarts allowed for a non-converging inverse photocurve.
    pub max_restarts: usize,
    /// Seed for the restart draws.
    pub seed: u64,
    pub min_stars_for_line: usize,
    pub min_stars_for_poly: usize,
    /// Reject fits that are not non-decreasing over the fitted range.
    pub require_monotonic: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            lm: LmSettings::default(),
            max_restarts: 1000,
            seed: 42,
            min_stars_for_line: MIN_STARS_FOR_LINE,
            min_stars_for_poly: MIN_STARS_FOR_POLY,
            require_monotonic: true,
        }
    }
}

/// Bulk-application limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Records whose propagated error exceeds this are dropped.
    pub max_mag_error: f64,
    /// Brightest plausible calibrated magnitude.
    pub brightest: f64,
    /// Faintest plausible calibrated magnitude.
    pub faintest: f64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            // 1.086 mag is the error of a 1-sigma detection; keep SNR >= 3.
            max_mag_error: 1.086 / 3.0,
            brightest: -30.0,
            faintest: 30.0,
        }
    }
}
