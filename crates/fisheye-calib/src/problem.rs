//! Residual and Jacobian assembly for the joint calibration problem.
//!
//! Parameter vector layout: `[fx, fy, cx, cy, k1, k2, k3, k4]` followed by
//! `[rvec, tvec]` per view. Residuals are `predicted - observed` in pixels,
//! two per corner, grouped by view in input order.
//!
//! The eight shared intrinsic parameters get an analytic Jacobian; the six
//! pose parameters per view use central finite differences. Per-view
//! blocks are independent, so they are computed in parallel and assembled
//! sequentially in view order to keep results bit-reproducible.

use fisheye_core::{model, CameraMatrix, CornerSet, Distortion, FisheyeCamera, Pose};
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;

pub(crate) const NUM_SHARED: usize = 8;
pub(crate) const POSE_PARAMS: usize = 6;
const POSE_FD_STEP: f64 = 1e-6;
const RADIUS_EPS: f64 = 1e-9;

pub(crate) struct CalibProblem<'a> {
    pub grid: &'a [Vector3<f64>],
    pub views: &'a [CornerSet],
}

struct ViewBlock {
    residuals: Vec<f64>,
    /// 2M x 8, row-major per residual.
    shared: Vec<[f64; NUM_SHARED]>,
    /// 2M x 6, row-major per residual.
    pose: Vec<[f64; POSE_PARAMS]>,
}

impl CalibProblem<'_> {
    pub fn n_params(&self) -> usize {
        NUM_SHARED + POSE_PARAMS * self.views.len()
    }

    pub fn n_residuals(&self) -> usize {
        2 * self.grid.len() * self.views.len()
    }

    pub fn pack(camera: &FisheyeCamera, poses: &[Pose]) -> DVector<f64> {
        let mut x = DVector::zeros(NUM_SHARED + POSE_PARAMS * poses.len());
        x[0] = camera.k.fx;
        x[1] = camera.k.fy;
        x[2] = camera.k.cx;
        x[3] = camera.k.cy;
        x[4] = camera.d.k1;
        x[5] = camera.d.k2;
        x[6] = camera.d.k3;
        x[7] = camera.d.k4;
        for (v, pose) in poses.iter().enumerate() {
            let base = NUM_SHARED + POSE_PARAMS * v;
            for i in 0..3 {
                x[base + i] = pose.rvec[i];
                x[base + 3 + i] = pose.tvec[i];
            }
        }
        x
    }

    pub fn unpack(x: &DVector<f64>) -> (FisheyeCamera, Vec<Pose>) {
        let camera = FisheyeCamera {
            k: CameraMatrix {
                fx: x[0],
                fy: x[1],
                cx: x[2],
                cy: x[3],
            },
            d: Distortion {
                k1: x[4],
                k2: x[5],
                k3: x[6],
                k4: x[7],
            },
        };
        let n_views = (x.len() - NUM_SHARED) / POSE_PARAMS;
        let poses = (0..n_views)
            .map(|v| {
                let base = NUM_SHARED + POSE_PARAMS * v;
                Pose::new(
                    Vector3::new(x[base], x[base + 1], x[base + 2]),
                    Vector3::new(x[base + 3], x[base + 4], x[base + 5]),
                )
            })
            .collect();
        (camera, poses)
    }

    pub fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let (camera, poses) = Self::unpack(x);
        let blocks: Vec<Vec<f64>> = poses
            .par_iter()
            .zip(self.views.par_iter())
            .map(|(pose, view)| view_residuals(self.grid, &camera, pose, view))
            .collect();

        let mut r = DVector::zeros(self.n_residuals());
        let mut row = 0;
        for block in blocks {
            for value in block {
                r[row] = value;
                row += 1;
            }
        }
        r
    }

    pub fn residuals_and_jacobian(&self, x: &DVector<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let (camera, poses) = Self::unpack(x);
        let blocks: Vec<ViewBlock> = poses
            .par_iter()
            .zip(self.views.par_iter())
            .map(|(pose, view)| view_block(self.grid, &camera, pose, view))
            .collect();

        let mut r = DVector::zeros(self.n_residuals());
        let mut jac = DMatrix::zeros(self.n_residuals(), self.n_params());
        let mut row = 0;
        for (v, block) in blocks.into_iter().enumerate() {
            let base = NUM_SHARED + POSE_PARAMS * v;
            for i in 0..block.residuals.len() {
                r[row] = block.residuals[i];
                for c in 0..NUM_SHARED {
                    jac[(row, c)] = block.shared[i][c];
                }
                for c in 0..POSE_PARAMS {
                    jac[(row, base + c)] = block.pose[i][c];
                }
                row += 1;
            }
        }
        (r, jac)
    }
}

fn view_residuals(
    grid: &[Vector3<f64>],
    camera: &FisheyeCamera,
    pose: &Pose,
    view: &CornerSet,
) -> Vec<f64> {
    let rot = pose.rotation();
    let mut out = Vec::with_capacity(2 * grid.len());
    for (g, obs) in grid.iter().zip(view.points.iter()) {
        let p = rot * g + pose.tvec;
        let uv = model::project_point(&p, camera);
        out.push(uv.x - obs.x);
        out.push(uv.y - obs.y);
    }
    out
}

fn view_block(
    grid: &[Vector3<f64>],
    camera: &FisheyeCamera,
    pose: &Pose,
    view: &CornerSet,
) -> ViewBlock {
    let rot = pose.rotation();
    let m = grid.len();
    let mut residuals = Vec::with_capacity(2 * m);
    let mut shared = Vec::with_capacity(2 * m);

    for (g, obs) in grid.iter().zip(view.points.iter()) {
        let p = rot * g + pose.tvec;
        let r = (p.x * p.x + p.y * p.y).sqrt();
        let theta = r.atan2(p.z);
        let theta_d = model::distorted_theta(theta, &camera.d);
        let (xr, yr) = if r > RADIUS_EPS {
            (p.x / r, p.y / r)
        } else {
            (0.0, 0.0)
        };

        let u = camera.k.fx * theta_d * xr + camera.k.cx;
        let v = camera.k.fy * theta_d * yr + camera.k.cy;
        residuals.push(u - obs.x);
        residuals.push(v - obs.y);

        let t2 = theta * theta;
        let t3 = t2 * theta;
        let t5 = t3 * t2;
        let t7 = t5 * t2;
        let t9 = t7 * t2;
        let fx_xr = camera.k.fx * xr;
        let fy_yr = camera.k.fy * yr;

        shared.push([
            theta_d * xr, // d/dfx
            0.0,
            1.0, // d/dcx
            0.0,
            fx_xr * t3, // d/dk1
            fx_xr * t5,
            fx_xr * t7,
            fx_xr * t9,
        ]);
        shared.push([
            0.0,
            theta_d * yr, // d/dfy
            0.0,
            1.0, // d/dcy
            fy_yr * t3,
            fy_yr * t5,
            fy_yr * t7,
            fy_yr * t9,
        ]);
    }

    // pose columns by central differences; the residual depends on the
    // pose only through this view's block
    let mut pose_jac = vec![[0.0f64; POSE_PARAMS]; 2 * m];
    for param in 0..POSE_PARAMS {
        let mut lo = *pose;
        let mut hi = *pose;
        match param {
            0..=2 => {
                lo.rvec[param] -= POSE_FD_STEP;
                hi.rvec[param] += POSE_FD_STEP;
            }
            _ => {
                lo.tvec[param - 3] -= POSE_FD_STEP;
                hi.tvec[param - 3] += POSE_FD_STEP;
            }
        }
        let r_lo = view_residuals(grid, camera, &lo, view);
        let r_hi = view_residuals(grid, camera, &hi, view);
        for i in 0..2 * m {
            pose_jac[i][param] = (r_hi[i] - r_lo[i]) / (2.0 * POSE_FD_STEP);
        }
    }

    ViewBlock {
        residuals,
        shared,
        pose: pose_jac,
    }
}
