//! Deterministic synthetic calibration scenes.
//!
//! Ground-truth camera and pose sets used by tests (and handy for
//! benchmarking solver changes against known parameters). Everything here
//! is a fixed table, so repeated runs are bit-identical.

use fisheye_core::{
    model::{project_point, undistort_normalized},
    object_grid, CameraMatrix, CheckerboardSpec, CornerSet, Distortion, FisheyeCamera,
    PixelBuffer, Pose,
};
use nalgebra::{Rotation3, Vector2, Vector3};

/// Image dimensions the reference camera is defined for.
pub const IMAGE_SIZE: (u32, u32) = (1280, 960);

/// Ground-truth camera with mild fisheye distortion, close enough to the
/// solver's dimension-based seed to be a fair recovery target.
pub fn reference_camera() -> FisheyeCamera {
    FisheyeCamera {
        k: CameraMatrix {
            fx: 430.0,
            fy: 424.0,
            cx: 645.0,
            cy: 476.0,
        },
        d: Distortion {
            k1: -0.015,
            k2: 0.007,
            k3: -0.002,
            k4: 0.0005,
        },
    }
}

const MAX_POSES: usize = 10;
const TILT_X: [f64; MAX_POSES] = [
    -0.32, 0.28, 0.05, -0.18, 0.33, 0.12, -0.27, 0.21, -0.08, 0.30,
];
const TILT_Y: [f64; MAX_POSES] = [
    0.24, -0.30, 0.34, 0.02, -0.22, 0.31, 0.16, -0.19, 0.27, -0.33,
];
const ROLL: [f64; MAX_POSES] = [
    0.0, 0.50, -0.45, 1.15, 0.85, -0.75, 0.30, -1.05, 0.60, 1.40,
];
const SHIFT_X: [f64; MAX_POSES] = [
    0.0, 1.4, -1.2, 0.8, -1.5, 0.5, 1.1, -0.7, 0.3, -1.0,
];
const SHIFT_Y: [f64; MAX_POSES] = [
    0.0, 0.5, 0.9, -1.1, -0.4, 1.2, -0.8, 0.6, -1.2, 0.9,
];
const DEPTH: [f64; MAX_POSES] = [
    10.0, 9.0, 11.0, 10.5, 9.5, 10.2, 11.5, 9.2, 10.8, 9.8,
];

/// `n` poses (up to 10) with varied tilt, roll, offset and depth, each
/// keeping the whole board inside the reference camera's view.
pub fn varied_poses(n: usize, spec: &CheckerboardSpec) -> Vec<Pose> {
    assert!(n <= MAX_POSES, "at most {MAX_POSES} canned poses available");
    let center = Vector3::new(
        f64::from(spec.cols - 1) / 2.0,
        f64::from(spec.rows - 1) / 2.0,
        0.0,
    );
    (0..n)
        .map(|i| {
            let rot = Rotation3::from_euler_angles(TILT_X[i], TILT_Y[i], ROLL[i]);
            let t = Vector3::new(SHIFT_X[i], SHIFT_Y[i], DEPTH[i]) - rot * center;
            Pose::from_rt(&rot, t)
        })
        .collect()
}

/// Exact corner projections for every pose, in row-major grid order.
pub fn project_corner_sets(
    camera: &FisheyeCamera,
    spec: &CheckerboardSpec,
    poses: &[Pose],
) -> Vec<CornerSet> {
    let grid = object_grid(spec);
    poses
        .iter()
        .map(|pose| {
            CornerSet::new(
                grid.iter()
                    .map(|g| project_point(&pose.transform(g), camera))
                    .collect(),
            )
        })
        .collect()
}

/// Render the checkerboard as seen through `camera` under `pose`.
///
/// Backward rendering: every pixel ray is undistorted, intersected with
/// the board plane, and shaded by the square it lands in (supersampled
/// for soft edges). White outside the board.
pub fn render_board_view(
    camera: &FisheyeCamera,
    spec: &CheckerboardSpec,
    pose: &Pose,
    image_size: (u32, u32),
) -> PixelBuffer {
    let (w, h) = (image_size.0 as usize, image_size.1 as usize);
    let rot = pose.rotation();
    let normal = rot * Vector3::z();
    let plane_offset = normal.dot(&pose.tvec);

    let mut data = vec![0u8; w * h];
    let sub = 2;
    for v in 0..h {
        for u in 0..w {
            let mut acc = 0.0;
            for sv in 0..sub {
                for su in 0..sub {
                    let px = u as f64 + (su as f64 + 0.5) / sub as f64 - 0.5;
                    let py = v as f64 + (sv as f64 + 0.5) / sub as f64 - 0.5;
                    let dist = Vector2::new(
                        (px - camera.k.cx) / camera.k.fx,
                        (py - camera.k.cy) / camera.k.fy,
                    );
                    acc += match undistort_normalized(dist, &camera.d) {
                        Some(tan) => {
                            let ray = Vector3::new(tan.x, tan.y, 1.0);
                            let denom = normal.dot(&ray);
                            if denom.abs() < 1e-9 {
                                255.0
                            } else {
                                let depth = plane_offset / denom;
                                if depth <= 0.0 {
                                    255.0
                                } else {
                                    let board = rot.transpose() * (ray * depth - pose.tvec);
                                    square_shade(board.x, board.y, spec)
                                }
                            }
                        }
                        None => 255.0,
                    };
                }
            }
            data[v * w + u] = (acc / (sub * sub) as f64).round() as u8;
        }
    }

    PixelBuffer::from_raw(w, h, 1, data).expect("buffer sized from image dimensions")
}

/// Shade of the board at corner-unit coordinates: interior corners sit at
/// integer positions, the physical board extends one square beyond them.
fn square_shade(bx: f64, by: f64, spec: &CheckerboardSpec) -> f64 {
    if bx < -1.0 || by < -1.0 || bx > f64::from(spec.cols) || by > f64::from(spec.rows) {
        return 255.0;
    }
    if (bx.floor() + by.floor()) as i64 % 2 == 0 {
        235.0
    } else {
        25.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_view_shows_both_square_shades() {
        let spec = CheckerboardSpec::new(5, 4);
        let camera = FisheyeCamera {
            k: CameraMatrix {
                fx: 60.0,
                fy: 60.0,
                cx: 79.5,
                cy: 59.5,
            },
            d: Distortion::default(),
        };
        let pose = varied_poses(1, &spec)[0];
        let img = render_board_view(&camera, &spec, &pose, (160, 120));
        assert!(img.data().iter().any(|&v| v < 60));
        assert!(img.data().iter().any(|&v| v > 200));
    }

    #[test]
    fn poses_keep_the_board_visible_and_in_front() {
        let spec = CheckerboardSpec::new(9, 6);
        let camera = reference_camera();
        let poses = varied_poses(MAX_POSES, &spec);
        let sets = project_corner_sets(&camera, &spec, &poses);

        let grid = object_grid(&spec);
        for (pose, set) in poses.iter().zip(sets.iter()) {
            assert_eq!(set.len(), 54);
            for (g, uv) in grid.iter().zip(set.points.iter()) {
                assert!(pose.transform(g).z > 0.0);
                assert!(uv.x > 0.0 && uv.x < f64::from(IMAGE_SIZE.0));
                assert!(uv.y > 0.0 && uv.y < f64::from(IMAGE_SIZE.1));
            }
        }
    }
}
