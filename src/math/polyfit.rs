//! Linear calibration fits: weighted parabola/line, zero-point, robust line.
//!
//! Coefficients follow `y = a·x² + b·x + c`. Weights are `1/err²` wherever
//! errors are supplied. Any non-finite coefficient is a hard failure.

use nalgebra::{DMatrix, DVector};

use crate::error::{CalibError, Result};
use crate::math::ols::{solve_least_squares, weighted_least_squares};
use crate::math::stats::{robust_sigma, weighted_mean, weighted_sd};

/// Tukey bisquare tuning constant (95% efficiency for Gaussian noise).
const BISQUARE_C: f64 = 4.685;

const ROBUST_MAX_ITERATIONS: usize = 100;
const ROBUST_TOL: f64 = 1e-10;

/// Result of a weighted polynomial fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub var_a: f64,
    pub var_b: f64,
    pub var_c: f64,
    /// Weighted residual sum of squares.
    pub chi2: f64,
}

/// Result of a weighted zero-point fit (`y = x + offset`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroPointFit {
    pub offset: f64,
    /// Weighted scatter of `y - x`; zero for a single point.
    pub sigma: f64,
    pub error_of_mean: f64,
}

/// Result of a robust (unweighted) line fit `y = slope·x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustLine {
    pub intercept: f64,
    pub slope: f64,
}

/// Weighted least-squares parabola.
pub fn wpolyfit(x: &[f64], y: &[f64], err: &[f64]) -> Result<PolyFit> {
    weighted_poly(x, y, err, 2)
}

/// Weighted least-squares straight line (`a = 0`).
pub fn wlinearfit(x: &[f64], y: &[f64], err: &[f64]) -> Result<PolyFit> {
    weighted_poly(x, y, err, 1)
}

fn weighted_poly(x: &[f64], y: &[f64], err: &[f64], degree: usize) -> Result<PolyFit> {
    let n = x.len();
    let p = degree + 1;
    if y.len() != n || err.len() != n {
        return Err(CalibError::input("x, y and error arrays differ in length"));
    }
    if n < p {
        return Err(CalibError::InsufficientPoints {
            what: if degree == 2 { "weighted parabola fit" } else { "weighted line fit" },
            needed: p,
            got: n,
        });
    }

    let mut design = DMatrix::<f64>::zeros(n, p);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
        if degree == 2 {
            design[(i, 2)] = xi * xi;
        }
    }
    let yv = DVector::from_column_slice(y);
    let w: Vec<f64> = err.iter().map(|e| 1.0 / (e * e)).collect();

    let sol = weighted_least_squares(&design, &yv, &w)
        .ok_or_else(|| CalibError::degenerate("singular weighted design matrix"))?;

    let fit = PolyFit {
        c: sol.beta[0],
        b: sol.beta[1],
        a: if degree == 2 { sol.beta[2] } else { 0.0 },
        var_c: sol.covariance[(0, 0)],
        var_b: sol.covariance[(1, 1)],
        var_a: if degree == 2 { sol.covariance[(2, 2)] } else { 0.0 },
        chi2: sol.chi2,
    };
    ensure_finite(&[fit.a, fit.b, fit.c], "polynomial fit")?;
    Ok(fit)
}

/// Weighted mean offset between catalog and instrumental magnitudes.
pub fn weighted_zeropoint(x: &[f64], y: &[f64], err: &[f64]) -> Result<ZeroPointFit> {
    let n = x.len();
    if n == 0 {
        return Err(CalibError::InsufficientPoints {
            what: "zero-point fit",
            needed: 1,
            got: 0,
        });
    }
    let diff: Vec<f64> = x.iter().zip(y).map(|(xi, yi)| yi - xi).collect();
    if n == 1 {
        log::warn!(
            "Only one star available for magnitude calibration, using the simple difference {:.4}",
            diff[0]
        );
        ensure_finite(&[diff[0]], "zero-point fit")?;
        return Ok(ZeroPointFit {
            offset: diff[0],
            sigma: 0.0,
            error_of_mean: 0.0,
        });
    }

    let w: Vec<f64> = err.iter().map(|e| 1.0 / (e * e)).collect();
    let offset = weighted_mean(&diff, &w)
        .ok_or_else(|| CalibError::degenerate("zero-point weights sum to zero"))?;
    let sigma = weighted_sd(&diff, &w, offset).unwrap_or(0.0);
    let error_of_mean = sigma / (n as f64).sqrt();
    log::info!("Final zero-point offset {offset:.4} +/-{error_of_mean:.4} mag (sigma= {sigma:.4} mag)");
    ensure_finite(&[offset], "zero-point fit")?;

    Ok(ZeroPointFit {
        offset,
        sigma,
        error_of_mean,
    })
}

/// Outlier-resistant straight line.
///
/// Bisquare M-estimator solved by iteratively reweighted least squares, with
/// the residual scale re-estimated from the MAD at every step. Falls back to
/// ordinary least squares if the reweighting collapses.
pub fn robustlinefit(x: &[f64], y: &[f64]) -> Result<RobustLine> {
    let n = x.len();
    if y.len() != n {
        return Err(CalibError::input("x and y arrays differ in length"));
    }
    match n {
        0 => {
            return Err(CalibError::InsufficientPoints {
                what: "robust line fit",
                needed: 1,
                got: 0,
            });
        }
        1 => {
            log::warn!("Too few points (1) for robust line fitting, using a horizontal line");
            return finite_line(y[0], 0.0);
        }
        2 => {
            log::warn!("Too few points (2) for robust line fitting, connecting the two points");
            let slope = (y[1] - y[0]) / (x[1] - x[0]);
            return finite_line(y[0] - slope * x[0], slope);
        }
        _ => {}
    }

    let design = line_design(x);
    let yv = DVector::from_column_slice(y);

    let Some(ols) = solve_least_squares(&design, &yv) else {
        return Err(CalibError::degenerate("singular design matrix in robust line fit"));
    };

    match bisquare_irls(&design, &yv, ols.clone()) {
        Some(beta) => finite_line(beta[0], beta[1]),
        None => {
            log::warn!("robust line fitting failed, falling back to the simple unweighted linear fit");
            finite_line(ols[0], ols[1])
        }
    }
}

fn bisquare_irls(design: &DMatrix<f64>, y: &DVector<f64>, start: DVector<f64>) -> Option<DVector<f64>> {
    let n = y.len();
    let mut beta = start;

    for _ in 0..ROBUST_MAX_ITERATIONS {
        let residuals: Vec<f64> = (y - design * &beta).iter().copied().collect();
        let scale = robust_sigma(&residuals)?;
        if scale <= f64::EPSILON * (1.0 + beta.amax()) {
            // All but a minority of points sit on the line already.
            return Some(beta);
        }

        let cutoff = BISQUARE_C * scale;
        let mut xw = design.clone();
        let mut yw = y.clone();
        let mut kept = 0usize;
        for i in 0..n {
            let u = residuals[i] / cutoff;
            let w = if u.abs() < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 };
            if w > 0.0 {
                kept += 1;
            }
            let sw = w.sqrt();
            xw.row_mut(i).scale_mut(sw);
            yw[i] *= sw;
        }
        if kept < 2 {
            return None;
        }

        let next = solve_least_squares(&xw, &yw)?;
        let step = (&next - &beta).amax();
        beta = next;
        if step <= ROBUST_TOL * (1.0 + beta.amax()) {
            return Some(beta);
        }
    }

    Some(beta)
}

/// Residuals of `y` about its robust line; used to remove slow trends.
pub fn detrend(x: &[f64], y: &[f64]) -> Result<Vec<f64>> {
    let line = robustlinefit(x, y)?;
    Ok(x.iter()
        .zip(y)
        .map(|(&xi, &yi)| yi - (line.slope * xi + line.intercept))
        .collect())
}

/// Robust noise estimate of `y` after removing its robust linear trend.
pub fn detrended_noise_scale(x: &[f64], y: &[f64]) -> Result<f64> {
    let residuals = detrend(x, y)?;
    robust_sigma(&residuals).ok_or_else(|| CalibError::input("no finite residuals for noise estimate"))
}

fn line_design(x: &[f64]) -> DMatrix<f64> {
    let mut design = DMatrix::<f64>::zeros(x.len(), 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
    }
    design
}

fn finite_line(intercept: f64, slope: f64) -> Result<RobustLine> {
    ensure_finite(&[intercept, slope], "robust line fit")?;
    Ok(RobustLine { intercept, slope })
}

fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CalibError::degenerate(format!("{what} produced non-finite coefficients")))
    }
}
