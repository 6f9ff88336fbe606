use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = Vec::with_capacity(pts.len());
    for p in pts {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        out.push(Point2::new(v[0], v[1]));
    }
    (out, t)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    let h = t_dst_inv * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    let h = h / s;
    // reject rank-deficient solutions (all-collinear or repeated inputs)
    if h.determinant().abs() < 1e-10 {
        return None;
    }
    Some(h)
}

/// Estimate H such that `dst ~ H * src`, by normalized DLT.
///
/// Needs at least four correspondences in general position; returns `None`
/// for mismatched inputs or degenerate configurations.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Build A (2N x 9), rows per correspondence:
    // [ -x -y -1   0  0  0   u*x u*y u ]
    // [  0  0  0  -x -y -1   v*x v*y v ]
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Solve Ah = 0: right singular vector with the smallest singular value
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let last = vt.nrows().checked_sub(1)?;
    let h = vt.row(last);

    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    denormalize(hn, ts, td)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(h: &Matrix3<f64>, p: Point2<f64>) -> Point2<f64> {
        let v = h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn dlt_recovers_known_homography() {
        let ground_truth = Matrix3::new(
            1.0, 0.2, 12.0, //
            -0.1, 0.9, 6.0, //
            0.0006, 0.0004, 1.0,
        );

        let src: Vec<Point2<f64>> = (0..4)
            .flat_map(|y| (0..4).map(move |x| Point2::new(f64::from(x) * 40.0, f64::from(y) * 50.0)))
            .collect();
        let dst: Vec<Point2<f64>> = src.iter().map(|&p| apply(&ground_truth, p)).collect();

        let estimated = estimate_homography(&src, &dst).expect("estimate");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(85.0, 110.0),
        ] {
            assert_close(apply(&estimated, p), apply(&ground_truth, p), 1e-6);
        }
    }

    #[test]
    fn mismatched_or_short_inputs_fail() {
        let a = vec![Point2::new(0.0, 0.0); 4];
        let b = vec![Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&a, &b).is_none());
        assert!(estimate_homography(&a[..3], &b).is_none());
    }

    #[test]
    fn repeated_points_are_degenerate() {
        let src = vec![Point2::new(3.0, 4.0); 8];
        let dst = vec![Point2::new(100.0, 100.0); 8];
        assert!(estimate_homography(&src, &dst).is_none());
    }
}
