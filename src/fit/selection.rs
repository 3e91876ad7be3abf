//! Family selection policy and post-fit validation.
//!
//! Rules:
//! 1. `n == 0` is an input error.
//! 2. `n == 1` always yields the zero-point shortcut `cat[0] − inst[0]`.
//! 3. Below `min_stars_for_line` only the robust line (for `robust-linear`)
//!    or a zero-point (everything else) is fitted.
//! 4. `auto` fits a weighted line below `min_stars_for_poly`; above it the
//!    photocurve and the parabola are compared on unit-weight RSS (ties go to
//!    the parabola) and the winner is refitted with the measured errors.
//! 5. The chosen model must have finite, not-all-zero coefficients and be
//!    non-decreasing over the fitted instrumental range.

use serde::Serialize;

use crate::domain::{CalibrationModel, ControlPoint, FitConfig, FitMode};
use crate::error::{CalibError, Result};
use crate::fit::fitter::{fit_family, ControlArrays, Family, FamilyFit, Weighting};
use crate::math::min_max;
use crate::models::{first_decrease, is_all_zero};

/// Score of one family considered during selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub family: &'static str,
    /// Unit-weight residual sum of squares; `None` if the fit failed.
    pub rss: Option<f64>,
}

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub model: CalibrationModel,
    pub mode: FitMode,
    pub n: usize,
    /// Unweighted residual sum of squares of the chosen model.
    pub rss: f64,
    /// Instrumental magnitude range the model was fitted over.
    pub range: (f64, f64),
    /// Families compared by `auto` (empty for explicit entry points).
    pub candidates: Vec<CandidateScore>,
    pub restarts: usize,
}

/// Fit the control points according to `mode` and validate the result.
pub fn fit_and_select(points: &[ControlPoint], mode: FitMode, config: &FitConfig) -> Result<FitSelection> {
    let n = points.len();
    if n == 0 {
        return Err(CalibError::input("no control points to fit"));
    }
    let data = ControlArrays::from_points(points);
    let range = min_max(&data.inst).ok_or_else(|| CalibError::input("no finite instrumental magnitudes"))?;

    let mut candidates = Vec::new();
    let fit = if n == 1 {
        log::warn!("Only one control point, falling back to a zero-point calibration");
        let offset = data.cat[0] - data.inst[0];
        FamilyFit {
            family: Family::Zeropoint,
            model: CalibrationModel::Zeropoint { offset },
            rss: 0.0,
            restarts: 0,
        }
    } else if n < config.min_stars_for_line {
        let family = if mode == FitMode::RobustLinear {
            Family::RobustLinear
        } else {
            Family::Zeropoint
        };
        log::warn!(
            "Only {n} control points (< {}), fitting a {} calibration",
            config.min_stars_for_line,
            family.display_name()
        );
        fit_family(family, &data, Weighting::Measured, config)?
    } else {
        match mode {
            FitMode::Linear => fit_family(Family::Linear, &data, Weighting::Measured, config)?,
            FitMode::Zeropoint => fit_family(Family::Zeropoint, &data, Weighting::Measured, config)?,
            FitMode::RobustLinear => fit_family(Family::RobustLinear, &data, Weighting::Measured, config)?,
            FitMode::Photocurve => fit_family(Family::Photocurve, &data, Weighting::Measured, config)?,
            FitMode::Parabola => fit_family(Family::Parabola, &data, Weighting::Measured, config)?,
            FitMode::Auto => select_auto(&data, config, &mut candidates)?,
        }
    };

    validate_model(&fit.model, range, config)?;
    log::info!(
        "Selected {} calibration from {n} control points (rss {:.6})",
        fit.model.display_name(),
        fit.rss
    );

    Ok(FitSelection {
        model: fit.model,
        mode,
        n,
        rss: fit.rss,
        range,
        candidates,
        restarts: fit.restarts,
    })
}

fn select_auto(data: &ControlArrays, config: &FitConfig, candidates: &mut Vec<CandidateScore>) -> Result<FamilyFit> {
    let n = data.len();
    if n < config.min_stars_for_poly {
        log::info!(
            "{n} control points (< {}), using a weighted linear fit",
            config.min_stars_for_poly
        );
        return fit_family(Family::Linear, data, Weighting::Measured, config);
    }

    let photocurve = score(Family::Photocurve, data, config, candidates);
    let parabola = score(Family::Parabola, data, config, candidates);

    let chosen = match (photocurve, parabola) {
        (Some(pc), Some(pb)) if pc < pb => Family::Photocurve,
        (Some(_), None) => Family::Photocurve,
        (_, Some(_)) => Family::Parabola,
        (None, None) => {
            return Err(CalibError::degenerate(
                "neither the photocurve nor the parabola could be fitted",
            ));
        }
    };
    log::info!("auto: {} has the lower unit-weight residuals", chosen.display_name());
    fit_family(chosen, data, Weighting::Measured, config)
}

fn score(
    family: Family,
    data: &ControlArrays,
    config: &FitConfig,
    candidates: &mut Vec<CandidateScore>,
) -> Option<f64> {
    let rss = match fit_family(family, data, Weighting::Unit, config) {
        Ok(fit) if fit.rss.is_finite() => Some(fit.rss),
        Ok(_) => {
            log::warn!("auto: {} fit is undefined over the control points", family.display_name());
            None
        }
        Err(err) => {
            log::warn!("auto: {} fit failed: {err}", family.display_name());
            None
        }
    };
    candidates.push(CandidateScore {
        family: family.display_name(),
        rss,
    });
    rss
}

/// Reject degenerate or non-monotonic calibrations.
pub fn validate_model(model: &CalibrationModel, range: (f64, f64), config: &FitConfig) -> Result<()> {
    if model.coefficients().iter().any(|c| !c.is_finite()) {
        return Err(CalibError::degenerate(format!(
            "{} fit produced non-finite coefficients",
            model.display_name()
        )));
    }
    if is_all_zero(model) {
        return Err(CalibError::degenerate(format!(
            "{} fit produced all-zero coefficients",
            model.display_name()
        )));
    }

    if let Some(at) = first_decrease(model, range.0, range.1) {
        if config.require_monotonic {
            return Err(CalibError::NonMonotonic { at });
        }
        log::warn!(
            "{} calibration decreases near instrumental magnitude {at:.3}, keeping it as requested",
            model.display_name()
        );
    }
    Ok(())
}
