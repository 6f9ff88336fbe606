use fisheye_core::{
    object_grid, CalibrationResult, CheckerboardSpec, CornerSet, Distortion, FisheyeCamera,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::init;
use crate::lm;
use crate::problem::CalibProblem;

/// Numerical floor for the fisheye model's degrees of freedom; more views
/// only improve conditioning.
pub const MIN_VIEWS: usize = 3;

/// Termination tuning for the joint refinement.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CalibrateOptions {
    /// Cap on accepted Levenberg-Marquardt iterations (bounded-time
    /// guarantee, not a failure).
    pub max_iters: usize,
    /// Relative cost-reduction threshold for convergence.
    pub ftol: f64,
    /// Gradient infinity-norm threshold for convergence.
    pub gtol: f64,
    /// Relative step-size threshold for convergence.
    pub xtol: f64,
    /// Consecutive rejected damped steps before giving up.
    pub max_rejections: usize,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self {
            max_iters: 30,
            ftol: 1e-6,
            gtol: 1e-12,
            xtol: 1e-12,
            max_rejections: 16,
        }
    }
}

/// Fatal calibration outcomes, with the reason a caller needs to decide
/// between "add more photos", "retake with more varied angles", and "bad
/// parameters supplied".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationFailure {
    #[error("need at least {need} valid views, got {got}")]
    InsufficientSamples { got: usize, need: usize },

    #[error("optimization stopped after {iterations} iterations without reducing the residual")]
    DidNotConverge { iterations: usize },

    #[error("degenerate view geometry: the calibration problem is rank-deficient")]
    DegenerateGeometry,
}

/// Jointly estimate shared intrinsics and per-view poses from detected
/// corner sets.
///
/// Corner sets whose length does not match `spec` are ignored (with a
/// warning); the remaining views must number at least [`MIN_VIEWS`].
/// Given identical inputs the result is bit-reproducible.
pub fn calibrate(
    corner_sets: &[CornerSet],
    spec: &CheckerboardSpec,
    image_size: (u32, u32),
    opts: &CalibrateOptions,
) -> Result<CalibrationResult, CalibrationFailure> {
    let expected = spec.corner_count();
    let views: Vec<CornerSet> = corner_sets
        .iter()
        .filter(|set| set.len() == expected)
        .cloned()
        .collect();
    if views.len() < corner_sets.len() {
        warn!(
            "{} corner set(s) with length != {expected} ignored",
            corner_sets.len() - views.len()
        );
    }
    if views.len() < MIN_VIEWS {
        return Err(CalibrationFailure::InsufficientSamples {
            got: views.len(),
            need: MIN_VIEWS,
        });
    }

    let grid = object_grid(spec);
    let k0 = init::initial_camera(image_size);
    info!(
        "calibrating from {} views of a {}x{} grid (f0 = {:.1} px)",
        views.len(),
        spec.cols,
        spec.rows,
        k0.fx
    );

    let mut poses = Vec::with_capacity(views.len());
    for view in &views {
        let pose =
            init::init_pose(view, &grid, &k0).ok_or(CalibrationFailure::DegenerateGeometry)?;
        poses.push(pose);
    }

    let camera0 = FisheyeCamera {
        k: k0,
        d: Distortion::default(),
    };
    let problem = CalibProblem {
        grid: &grid,
        views: &views,
    };
    let x0 = CalibProblem::pack(&camera0, &poses);
    let (x, iterations) = lm::optimize(&problem, x0, opts)?;
    let (camera, poses) = CalibProblem::unpack(&x);

    // reprojection diagnostics, per view and overall
    let residuals = problem.residuals(&x);
    let per_view = 2 * grid.len();
    let mut per_view_rms = Vec::with_capacity(views.len());
    let mut total = 0.0;
    for v in 0..views.len() {
        let block = residuals.rows(v * per_view, per_view);
        let sq = block.norm_squared();
        total += sq;
        per_view_rms.push((sq / grid.len() as f64).sqrt());
    }
    let rms = (total / (grid.len() * views.len()) as f64).sqrt();

    info!("calibration done in {iterations} iterations, rms reprojection error {rms:.4} px");

    Ok(CalibrationResult {
        camera,
        poses,
        per_view_rms,
        rms,
        iterations,
    })
}
