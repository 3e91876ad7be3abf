//! Levenberg–Marquardt solver for small nonlinear least-squares problems.
//!
//! We minimize `Σ r_i(p)^2` for a residual vector supplied together with its
//! analytic Jacobian. The damping follows Marquardt's scaling: the normal
//! equations are regularised with `λ·diag(JᵀJ)`, so the step is invariant to
//! rescaling individual parameters.
//!
//! Stopping rules mirror the classic "test delta" criterion: the iteration
//! stops once every component of the last accepted step satisfies
//! `|δ_i| < xtol_abs + xtol_rel·|p_i|`, or after `max_iterations`.
//!
//! A starting point whose residuals are not finite is reported as a
//! non-converged result with `cost = NaN`; callers treat that as a signal to
//! try another starting point.

use nalgebra::{DMatrix, DVector};

use crate::domain::LmSettings;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 10.0;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// A residual function with an analytic Jacobian.
pub trait LeastSquaresProblem {
    fn n_params(&self) -> usize;
    fn n_residuals(&self) -> usize;

    /// Fill `out` with the residuals at `params`.
    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);

    /// Fill `out` (`n_residuals × n_params`) with `∂r_i/∂p_j` at `params`.
    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>);
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStatus {
    /// Step-size criterion met.
    Converged,
    /// Ran out of iterations.
    MaxIterations,
    /// No downhill step could be found at any damping.
    NoProgress,
    /// Residuals or Jacobian became non-finite.
    NonFinite,
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// Final `Σ r_i^2`; NaN when the start point was unusable.
    pub cost: f64,
    pub iterations: usize,
    pub status: LmStatus,
}

/// Run Levenberg–Marquardt from `start`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    start: DVector<f64>,
    settings: &LmSettings,
) -> LmReport {
    let n = problem.n_residuals();
    let p = problem.n_params();

    let mut params = start;
    let mut r = DVector::<f64>::zeros(n);
    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut r_trial = DVector::<f64>::zeros(n);

    problem.residuals(&params, &mut r);
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return LmReport {
            params,
            cost: f64::NAN,
            iterations: 0,
            status: LmStatus::NonFinite,
        };
    }

    let mut lambda = LAMBDA_INIT;
    let mut status = LmStatus::MaxIterations;
    let mut iterations = 0;

    while iterations < settings.max_iterations {
        iterations += 1;

        problem.jacobian(&params, &mut jac);
        if jac.iter().any(|v| !v.is_finite()) {
            status = LmStatus::NonFinite;
            break;
        }
        let jtj = jac.transpose() * &jac;
        let gradient = jac.transpose() * &r;

        let mut accepted: Option<DVector<f64>> = None;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for j in 0..p {
                damped[(j, j)] += lambda * jtj[(j, j)].max(1e-12);
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= LAMBDA_UP;
                continue;
            };
            let step = -chol.solve(&gradient);
            let trial = &params + &step;
            problem.residuals(&trial, &mut r_trial);
            let trial_cost = r_trial.norm_squared();

            if trial_cost.is_finite() && trial_cost < cost {
                params = trial;
                std::mem::swap(&mut r, &mut r_trial);
                cost = trial_cost;
                lambda = (lambda / LAMBDA_DOWN).max(LAMBDA_MIN);
                accepted = Some(step);
                break;
            }
            lambda *= LAMBDA_UP;
        }

        let Some(step) = accepted else {
            status = LmStatus::NoProgress;
            break;
        };

        let small_step = step
            .iter()
            .zip(params.iter())
            .all(|(d, x)| d.abs() < settings.xtol_abs + settings.xtol_rel * x.abs());
        if small_step {
            status = LmStatus::Converged;
            break;
        }
    }

    LmReport {
        params,
        cost,
        iterations,
        status,
    }
}
