//! Explicit Levenberg-Marquardt loop with a bounded iteration and
//! convergence/failure contract.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::problem::CalibProblem;
use crate::solver::{CalibrateOptions, CalibrationFailure};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;

/// Minimize the reprojection cost from `x0`.
///
/// Returns the refined parameter vector and the number of accepted
/// iterations. Hitting `max_iters` is normal bounded-time termination;
/// failure is reserved for a rank-deficient problem or a damped step that
/// cannot reduce the residual after `max_rejections` consecutive tries.
pub(crate) fn optimize(
    problem: &CalibProblem<'_>,
    x0: DVector<f64>,
    opts: &CalibrateOptions,
) -> Result<(DVector<f64>, usize), CalibrationFailure> {
    let mut x = x0;
    let (mut residuals, mut jacobian) = problem.residuals_and_jacobian(&x);
    let mut cost = residuals.norm_squared();

    if rank_deficient(&jacobian) {
        return Err(CalibrationFailure::DegenerateGeometry);
    }

    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0usize;

    for _ in 0..opts.max_iters {
        let jt = jacobian.transpose();
        let h = &jt * &jacobian;
        let g = &jt * &residuals;

        if g.amax() < opts.gtol {
            break;
        }

        let mut accepted = false;
        for _ in 0..opts.max_rejections {
            let mut damped = h.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * h[(i, i)].max(1e-12);
            }
            let step = match damped.clone().cholesky() {
                Some(chol) => Some(chol.solve(&g)),
                None => damped.lu().solve(&g),
            };
            let Some(step) = step else {
                lambda *= 10.0;
                continue;
            };

            if step.norm() < opts.xtol * (x.norm() + opts.xtol) {
                // parameter-space convergence
                return Ok((x, iterations));
            }

            let candidate = &x - &step;
            let trial_cost = problem.residuals(&candidate).norm_squared();
            if trial_cost < cost {
                let relative_drop = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
                x = candidate;
                let refreshed = problem.residuals_and_jacobian(&x);
                residuals = refreshed.0;
                jacobian = refreshed.1;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                iterations += 1;
                accepted = true;
                debug!("lm iteration {iterations}: cost {cost:.6e}, lambda {lambda:.1e}");
                if relative_drop < opts.ftol {
                    return Ok((x, iterations));
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            return Err(CalibrationFailure::DidNotConverge { iterations });
        }
    }

    Ok((x, iterations))
}

/// Column-equilibrated rank check.
///
/// After scaling every column to unit norm, a direction the residuals do
/// not react to (near-coplanar views, unobservable parameters) collapses a
/// singular value toward zero independent of parameter scale.
fn rank_deficient(jacobian: &DMatrix<f64>) -> bool {
    let mut scaled = jacobian.clone();
    for mut col in scaled.column_iter_mut() {
        let norm = col.norm();
        if norm < 1e-300 {
            return true;
        }
        col /= norm;
    }
    let sv = scaled.svd(false, false).singular_values;
    let max_sv = sv.max();
    let min_sv = sv.min();
    !(min_sv > max_sv * 1e-12)
}
