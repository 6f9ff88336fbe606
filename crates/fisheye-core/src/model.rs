//! Equidistant (Kannala-Brandt) fisheye projection model.
//!
//! The distorted radius is a quartic polynomial in the incidence angle θ:
//!
//! ```text
//! θ_d = θ · (1 + k1·θ² + k2·θ⁴ + k3·θ⁶ + k4·θ⁸)
//! ```
//!
//! Normalized coordinates below are tan-plane coordinates (x/z, y/z) on the
//! undistorted side and θ_d-scaled unit-azimuth coordinates on the
//! distorted side.

use nalgebra::{Point2, Vector2, Vector3};

use crate::{Distortion, FisheyeCamera};

const EPS: f64 = 1e-9;
const MAX_NEWTON_STEPS: usize = 10;

/// Distorted angle θ_d for an incidence angle θ.
#[inline]
pub fn distorted_theta(theta: f64, d: &Distortion) -> f64 {
    let t2 = theta * theta;
    let t4 = t2 * t2;
    let t6 = t4 * t2;
    let t8 = t4 * t4;
    theta * (1.0 + d.k1 * t2 + d.k2 * t4 + d.k3 * t6 + d.k4 * t8)
}

/// Apply forward distortion to tan-plane coordinates.
pub fn distort_normalized(p: Vector2<f64>, d: &Distortion) -> Vector2<f64> {
    let r = p.norm();
    if r <= EPS {
        return p;
    }
    let theta = r.atan();
    p * (distorted_theta(theta, d) / r)
}

/// Invert the distortion: distorted normalized coordinates back to the
/// tan plane.
///
/// Newton iteration on θ, valid up to a 180° field of view. Returns `None`
/// when the iteration fails to converge or the recovered angle flips sign
/// (a point mirrored through the optical axis).
pub fn undistort_normalized(p: Vector2<f64>, d: &Distortion) -> Option<Vector2<f64>> {
    let theta_d = p.norm().min(std::f64::consts::PI);
    if theta_d <= EPS {
        return Some(p);
    }

    let mut theta = theta_d;
    let mut converged = false;
    for _ in 0..MAX_NEWTON_STEPS {
        let t2 = theta * theta;
        let t4 = t2 * t2;
        let t6 = t4 * t2;
        let t8 = t4 * t4;
        let residual = theta * (1.0 + d.k1 * t2 + d.k2 * t4 + d.k3 * t6 + d.k4 * t8) - theta_d;
        let derivative = 1.0 + 3.0 * d.k1 * t2 + 5.0 * d.k2 * t4 + 7.0 * d.k3 * t6 + 9.0 * d.k4 * t8;
        let step = (residual / derivative).clamp(-0.9, 0.9);
        theta -= step;
        if step.abs() < 1e-12 {
            converged = true;
            break;
        }
    }

    if !converged || theta < 0.0 {
        return None;
    }
    Some(p * (theta.tan() / theta_d))
}

/// Project a camera-frame 3D point to pixel coordinates.
pub fn project_point(p: &Vector3<f64>, camera: &FisheyeCamera) -> Point2<f64> {
    let r = (p.x * p.x + p.y * p.y).sqrt();
    let theta = r.atan2(p.z);
    let theta_d = distorted_theta(theta, &camera.d);
    let (xr, yr) = if r > EPS { (p.x / r, p.y / r) } else { (0.0, 0.0) };
    Point2::new(
        camera.k.fx * theta_d * xr + camera.k.cx,
        camera.k.fy * theta_d * yr + camera.k.cy,
    )
}
