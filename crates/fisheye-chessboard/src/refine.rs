//! Gradient-weighted sub-pixel corner refinement.
//!
//! Classic saddle-point iteration: inside a window around the current
//! estimate, every image gradient g at position q contributes the
//! constraint g·(q - c) = 0, since gradients on a checkerboard edge are
//! perpendicular to the ray from the true corner. Solving the weighted
//! normal equations moves the estimate; iterate until the step is small.

use fisheye_core::{sample_bilinear, GrayView};
use nalgebra::Point2;

use crate::params::RefineParams;

pub(crate) fn refine_corner(
    src: &GrayView<'_>,
    initial: Point2<f64>,
    params: &RefineParams,
) -> Point2<f64> {
    let half = params.half_window as i32;
    let sigma = f64::from(half).max(1.0) / 2.0;
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);

    let mut center = initial;
    for _ in 0..params.max_iters {
        let mut a11 = 0.0;
        let mut a12 = 0.0;
        let mut a22 = 0.0;
        let mut b1 = 0.0;
        let mut b2 = 0.0;

        for wy in -half..=half {
            for wx in -half..=half {
                let qx = center.x + f64::from(wx);
                let qy = center.y + f64::from(wy);
                // central differences need one pixel of margin for the
                // bilinear taps
                if qx < 1.0
                    || qy < 1.0
                    || qx > (src.width as f64) - 2.0
                    || qy > (src.height as f64) - 2.0
                {
                    continue;
                }

                let gx = 0.5 * (sample_bilinear(src, qx + 1.0, qy) - sample_bilinear(src, qx - 1.0, qy));
                let gy = 0.5 * (sample_bilinear(src, qx, qy + 1.0) - sample_bilinear(src, qx, qy - 1.0));

                let w = (-(f64::from(wx * wx + wy * wy)) * inv_two_sigma_sq).exp();
                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;

                a11 += gxx;
                a12 += gxy;
                a22 += gyy;
                b1 += gxx * qx + gxy * qy;
                b2 += gxy * qx + gyy * qy;
            }
        }

        let det = a11 * a22 - a12 * a12;
        if det.abs() < 1e-12 {
            break;
        }
        let nx = (a22 * b1 - a12 * b2) / det;
        let ny = (a11 * b2 - a12 * b1) / det;
        let shift = ((nx - center.x).powi(2) + (ny - center.y).powi(2)).sqrt();
        center = Point2::new(nx, ny);
        if shift < params.epsilon {
            break;
        }
    }

    // a refinement that ran away from its seed is worse than the seed
    if (center - initial).norm() > f64::from(half) {
        initial
    } else {
        center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Anti-aliased X-junction with the true corner at (cx, cy).
    fn saddle_image(w: usize, h: usize, cx: f64, cy: f64) -> Vec<u8> {
        let mut data = vec![0u8; w * h];
        let samples = 4;
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for sy in 0..samples {
                    for sx in 0..samples {
                        let px = x as f64 + (sx as f64 + 0.5) / samples as f64 - 0.5;
                        let py = y as f64 + (sy as f64 + 0.5) / samples as f64 - 0.5;
                        let dark = (px > cx) ^ (py > cy);
                        acc += if dark { 20.0 } else { 235.0 };
                    }
                }
                data[y * w + x] = (acc / (samples * samples) as f64).round() as u8;
            }
        }
        data
    }

    #[test]
    fn converges_to_the_saddle_point() {
        let (w, h) = (31, 31);
        let truth = Point2::new(15.3, 14.6);
        let data = saddle_image(w, h, truth.x, truth.y);
        let view = GrayView {
            width: w,
            height: h,
            data: &data,
        };

        let mut params = RefineParams::default();
        params.epsilon = 0.01;
        let refined = refine_corner(&view, Point2::new(16.0, 14.0), &params);
        assert!(
            (refined - truth).norm() < 0.25,
            "refined to {refined:?}, truth {truth:?}"
        );
    }

    #[test]
    fn flat_window_keeps_the_seed() {
        let (w, h) = (21, 21);
        let data = vec![90u8; w * h];
        let view = GrayView {
            width: w,
            height: h,
            data: &data,
        };
        let seed = Point2::new(10.0, 10.0);
        let refined = refine_corner(&view, seed, &RefineParams::default());
        assert_eq!(refined, seed);
    }
}
