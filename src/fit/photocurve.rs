//! Dual photocurve fit: forward and inverse branch, keep the better one.
//!
//! The forward branch is well behaved from the standard starting guess. The
//! inverse branch is only defined where `(m − a3)/a0 > 0`, so a poor starting
//! `a3` leaves it with non-finite residuals; in that case we redraw the two
//! offsets around the starting guess with unit-Gaussian perturbations until a
//! usable start is found or the restart budget is exhausted.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{FitConfig, ModelTag, PhotocurveParams};
use crate::error::{CalibError, Result};
use crate::math::{levenberg_marquardt, min_max, LmReport};
use crate::models::{Branch, PhotocurveProblem};

/// Number of photocurve parameters.
const N_PARAMS: usize = 4;

/// Shape parameters of the starting guess (`a0`, `a1`).
const START_A0: f64 = 0.3;
const START_A1: f64 = 1.0;

/// Outcome of [`fit_photocurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotocurveFit {
    pub params: PhotocurveParams,
    /// `Photocurve` or `InversePhotocurve`.
    pub tag: ModelTag,
    /// Error-weighted `Σ r²` divided by `n − 4`.
    pub reduced_chi2: f64,
    /// Error-weighted `Σ r²`.
    pub chi2: f64,
    /// Reduced chi-square of the losing branch (NaN if it never converged).
    pub other_reduced_chi2: f64,
    /// Random restarts spent on the inverse branch.
    pub restarts: usize,
}

/// Fit both photocurve branches and return the better one.
///
/// `inst`, `cat` and `err` are parallel arrays; `err` must be positive.
pub fn fit_photocurve(inst: &[f64], cat: &[f64], err: &[f64], config: &FitConfig) -> Result<PhotocurveFit> {
    let n = inst.len();
    if cat.len() != n || err.len() != n {
        return Err(CalibError::input("instrumental, catalog and error arrays differ in length"));
    }
    if n <= N_PARAMS {
        return Err(CalibError::InsufficientPoints {
            what: "photocurve fit",
            needed: N_PARAMS + 1,
            got: n,
        });
    }
    let dof = (n - N_PARAMS) as f64;

    let (inst_min, _) = min_max(inst).ok_or_else(|| CalibError::input("no finite instrumental magnitudes"))?;
    let (cat_min, _) = min_max(cat).ok_or_else(|| CalibError::input("no finite catalog magnitudes"))?;

    // 1) Forward branch.
    let forward_problem = PhotocurveProblem {
        branch: Branch::Forward,
        x: inst,
        y: cat,
        err,
    };
    let forward_start = [START_A0, START_A1, inst_min, cat_min];
    let forward = levenberg_marquardt(&forward_problem, DVector::from_row_slice(&forward_start), &config.lm);
    let forward_rchi2 = forward.cost / dof;
    log::debug!(
        "photocurve: forward branch {:?} after {} iterations, reduced chi2 {forward_rchi2:.6}",
        forward.status,
        forward.iterations
    );

    // 2) Inverse branch, offsets swapped in the starting guess.
    let inverse_problem = PhotocurveProblem {
        branch: Branch::Inverse,
        x: inst,
        y: cat,
        err,
    };
    let inverse_start = [START_A0, START_A1, cat_min, inst_min];
    let (inverse, restarts) = fit_inverse_with_restarts(&inverse_problem, inverse_start, config)?;
    let inverse_rchi2 = inverse.cost / dof;
    log::debug!(
        "photocurve: inverse branch {:?} after {} iterations and {restarts} restarts, reduced chi2 {inverse_rchi2:.6}",
        inverse.status,
        inverse.iterations
    );

    // 3) Selection.
    let inverse_wins = inverse_beats_forward(forward_rchi2, inverse_rchi2);
    let (winner, tag, other_rchi2) = if inverse_wins {
        (inverse, ModelTag::InversePhotocurve, forward_rchi2)
    } else {
        (forward, ModelTag::Photocurve, inverse_rchi2)
    };

    if !winner.cost.is_finite() || winner.params.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::degenerate("photocurve fit did not produce finite coefficients"));
    }
    let params = PhotocurveParams::from_slice(winner.params.as_slice());
    if params.to_array().iter().all(|&v| v == 0.0) {
        return Err(CalibError::degenerate("photocurve coefficients collapsed to zero"));
    }

    log::info!(
        "photocurve: selected {} (reduced chi2 {:.6} vs {:.6})",
        if inverse_wins { "inverse photocurve" } else { "photocurve" },
        winner.cost / dof,
        other_rchi2
    );

    Ok(PhotocurveFit {
        params,
        tag,
        reduced_chi2: winner.cost / dof,
        chi2: winner.cost,
        other_reduced_chi2: other_rchi2,
        restarts,
    })
}

/// Forward wins ties and inverse failure.
fn inverse_beats_forward(forward_rchi2: f64, inverse_rchi2: f64) -> bool {
    inverse_rchi2.is_finite() && (!forward_rchi2.is_finite() || inverse_rchi2 < forward_rchi2)
}

fn fit_inverse_with_restarts(
    problem: &PhotocurveProblem<'_>,
    start: [f64; N_PARAMS],
    config: &FitConfig,
) -> Result<(LmReport, usize)> {
    let mut report = levenberg_marquardt(problem, DVector::from_row_slice(&start), &config.lm);
    if report.cost.is_finite() {
        return Ok((report, 0));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| CalibError::input(format!("restart distribution error: {e}")))?;

    let mut restarts = 0;
    while !report.cost.is_finite() && restarts < config.max_restarts {
        restarts += 1;
        let mut guess = start;
        guess[2] += normal.sample(&mut rng);
        guess[3] += normal.sample(&mut rng);
        report = levenberg_marquardt(problem, DVector::from_row_slice(&guess), &config.lm);
    }

    if !report.cost.is_finite() {
        log::warn!(
            "inverse photocurve did not converge after {restarts} restarts, keeping the forward branch"
        );
    }
    Ok((report, restarts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::eval_photocurve;

    fn synthetic(params: &PhotocurveParams, tag: ModelTag, n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let inst: Vec<f64> = (0..n).map(|i| 8.0 + 6.0 * i as f64 / (n as f64 - 1.0)).collect();
        let cat: Vec<f64> = inst.iter().map(|&m| eval_photocurve(m, params, tag)).collect();
        let err = vec![0.02; n];
        (inst, cat, err)
    }

    #[test]
    fn recovers_forward_photocurve() {
        let truth = PhotocurveParams {
            a0: 0.9,
            a1: 1.1,
            a2: 9.5,
            a3: 10.0,
        };
        let (inst, cat, err) = synthetic(&truth, ModelTag::Photocurve, 40);

        let fit = fit_photocurve(&inst, &cat, &err, &FitConfig::default()).unwrap();
        assert!(fit.reduced_chi2 < 1e-2, "reduced chi2 {}", fit.reduced_chi2);
        for &m in &inst {
            let model = eval_photocurve(m, &fit.params, fit.tag);
            let expected = eval_photocurve(m, &truth, ModelTag::Photocurve);
            assert!((model - expected).abs() < 5e-3, "m={m}: {model} vs {expected}");
        }
    }

    #[test]
    fn result_is_monotonic_over_fitted_range() {
        let truth = PhotocurveParams {
            a0: 1.0,
            a1: 0.8,
            a2: 10.0,
            a3: 11.0,
        };
        let (inst, mut cat, err) = synthetic(&truth, ModelTag::Photocurve, 30);
        // Mild deterministic scatter.
        for (i, c) in cat.iter_mut().enumerate() {
            *c += 0.01 * ((i * 3 % 7) as f64 - 3.0);
        }

        let fit = fit_photocurve(&inst, &cat, &err, &FitConfig::default()).unwrap();
        let mut prev = eval_photocurve(inst[0], &fit.params, fit.tag);
        for &m in &inst[1..] {
            let v = eval_photocurve(m, &fit.params, fit.tag);
            assert!(v >= prev - 1e-9, "decrease at {m}");
            prev = v;
        }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let x = [10.0, 11.0, 12.0, 13.0];
        let err = [0.02; 4];
        let res = fit_photocurve(&x, &x, &err, &FitConfig::default());
        assert!(matches!(res, Err(CalibError::InsufficientPoints { needed: 5, got: 4, .. })));
    }

    /// Inverse-shaped data whose starting `a3` sits on the lower edge of the
    /// inverse branch domain.
    fn inverse_fixture() -> (PhotocurveParams, Vec<f64>, Vec<f64>, Vec<f64>) {
        let truth = PhotocurveParams {
            a0: 0.8,
            a1: 1.2,
            a2: 10.0,
            a3: 8.0,
        };
        let n = 40;
        let inst: Vec<f64> = (0..n).map(|i| 8.3 + 6.0 * i as f64 / (n as f64 - 1.0)).collect();
        let cat: Vec<f64> = inst
            .iter()
            .map(|&m| eval_photocurve(m, &truth, ModelTag::InversePhotocurve))
            .collect();
        let err = vec![0.02; n];
        (truth, inst, cat, err)
    }

    #[test]
    fn inverse_branch_recovered_after_restarts() {
        let (truth, inst, cat, err) = inverse_fixture();
        let fit = fit_photocurve(&inst, &cat, &err, &FitConfig::default()).unwrap();

        assert_eq!(fit.tag, ModelTag::InversePhotocurve);
        assert!(fit.restarts > 0, "restarts {}", fit.restarts);
        assert!(fit.restarts <= FitConfig::default().max_restarts);
        assert!(fit.reduced_chi2 <= fit.other_reduced_chi2 || !fit.other_reduced_chi2.is_finite());
        for &m in &inst {
            let model = eval_photocurve(m, &fit.params, fit.tag);
            let expected = eval_photocurve(m, &truth, ModelTag::InversePhotocurve);
            assert!((model - expected).abs() < 5e-3, "m={m}: {model} vs {expected}");
        }
    }

    #[test]
    fn forward_kept_when_inverse_never_converges() {
        let (_, inst, cat, err) = inverse_fixture();
        let config = FitConfig {
            max_restarts: 0,
            ..FitConfig::default()
        };
        let fit = fit_photocurve(&inst, &cat, &err, &config).unwrap();

        assert_eq!(fit.tag, ModelTag::Photocurve);
        assert_eq!(fit.restarts, 0);
        assert!(!fit.other_reduced_chi2.is_finite());
        assert!(fit.params.to_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn forward_wins_ties_and_inverse_failure() {
        assert!(!inverse_beats_forward(1.5, 1.5));
        assert!(!inverse_beats_forward(1.5, f64::NAN));
        assert!(!inverse_beats_forward(1.5, f64::INFINITY));
        assert!(!inverse_beats_forward(1.0, 2.0));
        assert!(inverse_beats_forward(2.0, 1.0));
        assert!(inverse_beats_forward(f64::NAN, 1.0));
    }

    #[test]
    fn restart_stream_is_reproducible_per_seed() {
        let (_, inst, cat, err) = inverse_fixture();
        for seed in [7, 42] {
            let config = FitConfig {
                seed,
                ..FitConfig::default()
            };
            let a = fit_photocurve(&inst, &cat, &err, &config).unwrap();
            let b = fit_photocurve(&inst, &cat, &err, &config).unwrap();
            assert_eq!(a.params, b.params, "seed {seed}");
            assert_eq!(a.tag, b.tag, "seed {seed}");
            assert_eq!(a.restarts, b.restarts, "seed {seed}");
        }
    }

    #[test]
    fn same_seed_gives_same_result() {
        let truth = PhotocurveParams {
            a0: 0.7,
            a1: 1.3,
            a2: 9.0,
            a3: 10.2,
        };
        let (inst, cat, err) = synthetic(&truth, ModelTag::Photocurve, 25);
        let config = FitConfig::default();
        let a = fit_photocurve(&inst, &cat, &err, &config).unwrap();
        let b = fit_photocurve(&inst, &cat, &err, &config).unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.tag, b.tag);
        assert_eq!(a.restarts, b.restarts);
    }
}
