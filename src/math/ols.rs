//! Weighted linear least squares.
//!
//! Every linear calibration family reduces to a small problem of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and solve an ordinary least squares problem
//!   with SVD, which handles tall design matrices directly.
//! - A rank-deficient design is reported as `None` rather than silently
//!   returning the minimum-norm solution: a collapsed calibration must fail.
//! - The parameter covariance is `(X^T W X)^-1`, unscaled by the residual
//!   variance, so that errors are taken at face value.

use nalgebra::{DMatrix, DVector};

/// Singular values below `RANK_TOL * σ_max` mark the design as singular.
const RANK_TOL: f64 = 1e-12;

/// Weighted least squares solution.
#[derive(Debug, Clone)]
pub struct WlsSolution {
    pub beta: DVector<f64>,
    /// Parameter covariance `(X^T W X)^-1`.
    pub covariance: DMatrix<f64>,
    /// Weighted residual sum of squares `Σ w_i r_i^2`.
    pub chi2: f64,
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is rank deficient or the solution is not finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() < x.ncols() || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);
    let sv_max = svd.singular_values.max();
    let sv_min = svd.singular_values.min();
    if !(sv_max.is_finite() && sv_max > 0.0) || sv_min <= sv_max * RANK_TOL {
        return None;
    }

    let beta = svd.solve(y, sv_max * RANK_TOL).ok()?;
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}

/// Weighted least squares with covariance and chi-square.
///
/// `w` are the observation weights (`1/σ²` for the calibration fits).
pub fn weighted_least_squares(x: &DMatrix<f64>, y: &DVector<f64>, w: &[f64]) -> Option<WlsSolution> {
    let n = x.nrows();
    if w.len() != n || y.len() != n {
        return None;
    }
    if w.iter().any(|wi| !wi.is_finite() || *wi <= 0.0) {
        return None;
    }

    let mut xw = x.clone();
    let mut yw = y.clone();
    for i in 0..n {
        let sw = w[i].sqrt();
        xw.row_mut(i).scale_mut(sw);
        yw[i] *= sw;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    let covariance = (xw.transpose() * &xw).try_inverse()?;
    let residuals = yw - &xw * &beta;
    let chi2 = residuals.norm_squared();
    if !chi2.is_finite() {
        return None;
    }

    Some(WlsSolution {
        beta,
        covariance,
        chi2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn collinear_design_is_rejected() {
        // All x identical: the slope column is a multiple of the intercept column.
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 4.0, 1.0, 4.0, 1.0, 4.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }

    #[test]
    fn weighted_solution_reports_chi2_and_covariance() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 3.0, 5.0, 7.5]);
        let w = [4.0, 4.0, 4.0, 4.0];

        let sol = weighted_least_squares(&x, &y, &w).unwrap();
        assert!(sol.chi2 > 0.0);
        assert!(sol.covariance[(0, 0)] > 0.0);
        assert!(sol.covariance[(1, 1)] > 0.0);

        // Zero weight is not a valid observation weight.
        assert!(weighted_least_squares(&x, &y, &[4.0, 0.0, 4.0, 4.0]).is_none());
    }
}
