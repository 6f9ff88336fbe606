//! Heuristic initialization: intrinsic seed from the image dimensions and
//! a homography-based planar pose per view, distortion ignored.

use fisheye_core::{estimate_homography, CameraMatrix, CornerSet, Pose};
use nalgebra::{Matrix3, Point2, Rotation3, Vector3};

/// Intrinsic seed: principal point at the pixel-grid center, focal length
/// assuming the equidistant model covers 180 degrees across the larger
/// image dimension (r_max = f * pi/2).
pub(crate) fn initial_camera(image_size: (u32, u32)) -> CameraMatrix {
    let w = f64::from(image_size.0);
    let h = f64::from(image_size.1);
    let f = w.max(h) / std::f64::consts::PI;
    CameraMatrix {
        fx: f,
        fy: f,
        cx: (w - 1.0) / 2.0,
        cy: (h - 1.0) / 2.0,
    }
}

/// Planar pose from the board->normalized-image homography.
///
/// Classic decomposition for a Z = 0 target: H ~ [r1 r2 t] up to scale.
/// The rotation is projected onto SO(3) by SVD; the h33 = 1 normalization
/// of the homography keeps the board in front of the camera.
pub(crate) fn init_pose(
    view: &CornerSet,
    grid: &[Vector3<f64>],
    k: &CameraMatrix,
) -> Option<Pose> {
    let obj: Vec<Point2<f64>> = grid.iter().map(|g| Point2::new(g.x, g.y)).collect();
    let norm: Vec<Point2<f64>> = view
        .points
        .iter()
        .map(|p| Point2::new((p.x - k.cx) / k.fx, (p.y - k.cy) / k.fy))
        .collect();

    let h = estimate_homography(&obj, &norm)?;

    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let n1 = h1.norm();
    let n2 = h2.norm();
    if n1 < 1e-12 || n2 < 1e-12 {
        return None;
    }
    // scale from the mean of the two rotation-column norms
    let lambda = 2.0 / (n1 + n2);

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let raw = Matrix3::from_columns(&[r1, r2, r3]);

    // project onto SO(3) (polar decomposition via SVD)
    let svd = raw.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut rot = u * v_t;
    if rot.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        rot = u_flipped * v_t;
    }

    let t = h3 * lambda;
    if !t.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(Pose::from_rt(
        &Rotation3::from_matrix_unchecked(rot),
        t,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisheye_core::{object_grid, CheckerboardSpec};
    use nalgebra::Rotation3;

    #[test]
    fn focal_seed_covers_the_larger_dimension() {
        let k = initial_camera((1280, 960));
        assert!((k.fx - 1280.0 / std::f64::consts::PI).abs() < 1e-9);
        assert_eq!(k.fx, k.fy);
        assert!((k.cx - 639.5).abs() < 1e-9);
        assert!((k.cy - 479.5).abs() < 1e-9);
    }

    #[test]
    fn planar_pose_recovered_from_pinhole_observations() {
        let k = CameraMatrix {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
        };
        let spec = CheckerboardSpec::new(9, 6);
        let grid = object_grid(&spec);

        let rot = Rotation3::from_euler_angles(0.1, -0.15, 0.2);
        let t = Vector3::new(-3.5, -2.0, 12.0);
        let pose_gt = Pose::from_rt(&rot, t);

        // pinhole projection (distortion-free initialization regime)
        let corners = CornerSet::new(
            grid.iter()
                .map(|g| {
                    let p = pose_gt.transform(g);
                    Point2::new(k.fx * p.x / p.z + k.cx, k.fy * p.y / p.z + k.cy)
                })
                .collect(),
        );

        let pose = init_pose(&corners, &grid, &k).expect("pose init");
        assert!((pose.tvec - pose_gt.tvec).norm() < 1e-6);
        assert!((pose.rvec - pose_gt.rvec).norm() < 1e-6);
        assert!(pose.tvec.z > 0.0);
    }

    #[test]
    fn collapsed_corners_have_no_pose() {
        let k = initial_camera((640, 480));
        let spec = CheckerboardSpec::new(9, 6);
        let grid = object_grid(&spec);
        let corners = CornerSet::new(vec![Point2::new(100.0, 100.0); grid.len()]);
        assert!(init_pose(&corners, &grid, &k).is_none());
    }
}
