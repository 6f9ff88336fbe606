//! End-to-end detector tests on rendered checkerboards.

use fisheye_chessboard::{ChessboardDetector, DetectionFailure};
use fisheye_core::model::undistort_normalized;
use fisheye_core::{
    model::project_point, CameraMatrix, CheckerboardSpec, Distortion, FisheyeCamera, PixelBuffer,
};
use nalgebra::{Point2, Vector2, Vector3};

const DARK: f64 = 25.0;
const LIGHT: f64 = 235.0;

/// Planar board rotated in-plane, anti-aliased by supersampling.
/// Returns the image and the true interior corners in row-major order.
fn render_rotated_board(
    cols: u32,
    rows: u32,
    square: f64,
    rot: f64,
    img_w: usize,
    img_h: usize,
) -> (PixelBuffer, Vec<Point2<f64>>) {
    let board_w = f64::from(cols + 1) * square;
    let board_h = f64::from(rows + 1) * square;
    let board_c = Vector2::new(board_w / 2.0, board_h / 2.0);
    let img_c = Vector2::new(img_w as f64 / 2.0, img_h as f64 / 2.0);
    let (sin, cos) = rot.sin_cos();

    let mut data = vec![0u8; img_w * img_h];
    let sub = 3;
    for y in 0..img_h {
        for x in 0..img_w {
            let mut acc = 0.0;
            for sy in 0..sub {
                for sx in 0..sub {
                    let px = x as f64 + (sx as f64 + 0.5) / sub as f64 - 0.5 - img_c.x;
                    let py = y as f64 + (sy as f64 + 0.5) / sub as f64 - 0.5 - img_c.y;
                    // inverse rotation back into board coordinates
                    let bx = cos * px + sin * py + board_c.x;
                    let by = -sin * px + cos * py + board_c.y;
                    acc += board_shade(bx, by, square, board_w, board_h);
                }
            }
            data[y * img_w + x] = (acc / (sub * sub) as f64).round() as u8;
        }
    }

    let mut corners = Vec::new();
    for j in 1..=rows {
        for i in 1..=cols {
            let bx = f64::from(i) * square - board_c.x;
            let by = f64::from(j) * square - board_c.y;
            corners.push(Point2::new(
                cos * bx - sin * by + img_c.x,
                sin * bx + cos * by + img_c.y,
            ));
        }
    }

    (
        PixelBuffer::from_raw(img_w, img_h, 1, data).unwrap(),
        corners,
    )
}

fn board_shade(bx: f64, by: f64, square: f64, board_w: f64, board_h: f64) -> f64 {
    if bx < 0.0 || by < 0.0 || bx >= board_w || by >= board_h {
        return 255.0;
    }
    let parity = ((bx / square).floor() + (by / square).floor()) as i64;
    if parity % 2 == 0 {
        DARK
    } else {
        LIGHT
    }
}

/// Fronto-parallel board seen through a fisheye lens.
fn render_fisheye_board(
    cols: u32,
    rows: u32,
    camera: &FisheyeCamera,
    depth: f64,
    img_w: usize,
    img_h: usize,
) -> (PixelBuffer, Vec<Point2<f64>>) {
    let board_w = f64::from(cols + 1);
    let board_h = f64::from(rows + 1);
    // board centered on the optical axis, square size = 1 unit
    let t = Vector3::new(-board_w / 2.0, -board_h / 2.0, depth);

    let mut data = vec![0u8; img_w * img_h];
    let sub = 2;
    for y in 0..img_h {
        for x in 0..img_w {
            let mut acc = 0.0;
            for sy in 0..sub {
                for sx in 0..sub {
                    let u = x as f64 + (sx as f64 + 0.5) / sub as f64 - 0.5;
                    let v = y as f64 + (sy as f64 + 0.5) / sub as f64 - 0.5;
                    let dist = Vector2::new(
                        (u - camera.k.cx) / camera.k.fx,
                        (v - camera.k.cy) / camera.k.fy,
                    );
                    let shade = match undistort_normalized(dist, &camera.d) {
                        Some(ray) => {
                            let bx = ray.x * depth - t.x;
                            let by = ray.y * depth - t.y;
                            board_shade(bx, by, 1.0, board_w, board_h)
                        }
                        None => 255.0,
                    };
                    acc += shade;
                }
            }
            data[y * img_w + x] = (acc / (sub * sub) as f64).round() as u8;
        }
    }

    let mut corners = Vec::new();
    for j in 1..=rows {
        for i in 1..=cols {
            let p = Vector3::new(f64::from(i) + t.x, f64::from(j) + t.y, depth);
            corners.push(project_point(&p, camera));
        }
    }

    (
        PixelBuffer::from_raw(img_w, img_h, 1, data).unwrap(),
        corners,
    )
}

fn assert_corners_match(detected: &[Point2<f64>], truth: &[Point2<f64>], max_err: f64) {
    assert_eq!(detected.len(), truth.len());
    let mut total = 0.0;
    let mut worst = 0.0f64;
    for (got, want) in detected.iter().zip(truth.iter()) {
        let err = (got - want).norm();
        total += err;
        worst = worst.max(err);
    }
    let mean = total / truth.len() as f64;
    assert!(
        worst < max_err,
        "worst corner error {worst:.3} px exceeds {max_err} (mean {mean:.3})"
    );
    assert!(mean < max_err / 2.0, "mean corner error {mean:.3} px too large");
}

#[test]
fn detects_rotated_board_in_order() {
    let spec = CheckerboardSpec::new(9, 6);
    let (image, truth) = render_rotated_board(9, 6, 30.0, 0.15, 480, 360);

    let corners = ChessboardDetector::default()
        .detect(&image, &spec)
        .expect("board detected");
    assert_eq!(corners.len(), 54);
    assert_corners_match(&corners.points, &truth, 0.5);
}

#[test]
fn detects_board_under_fisheye_distortion() {
    let camera = FisheyeCamera {
        k: CameraMatrix {
            fx: 260.0,
            fy: 260.0,
            cx: 319.5,
            cy: 239.5,
        },
        d: Distortion {
            k1: 0.08,
            k2: -0.01,
            k3: 0.004,
            k4: -0.001,
        },
    };
    let spec = CheckerboardSpec::new(9, 6);
    let (image, truth) = render_fisheye_board(9, 6, &camera, 5.2, 640, 480);

    let corners = ChessboardDetector::default()
        .detect(&image, &spec)
        .expect("board detected");
    assert_corners_match(&corners.points, &truth, 0.8);
}

#[test]
fn corner_count_invariant_for_9x6() {
    let spec = CheckerboardSpec::new(9, 6);
    let (image, truth) = render_rotated_board(9, 6, 30.0, -0.1, 480, 360);
    let corners = ChessboardDetector::default()
        .detect(&image, &spec)
        .expect("board detected");
    assert_eq!(corners.len(), spec.corner_count());
    assert_eq!(corners.len(), 54);
    // row-major: the first corner is the top-left one
    assert!((corners.points[0] - truth[0]).norm() < 0.5);
    assert!((corners.points[53] - truth[53]).norm() < 0.5);
}

#[test]
fn wrong_spec_size_is_a_count_mismatch() {
    let (image, _) = render_rotated_board(9, 6, 30.0, 0.12, 480, 360);
    let err = ChessboardDetector::default()
        .detect(&image, &CheckerboardSpec::new(9, 7))
        .unwrap_err();
    assert_eq!(
        err,
        DetectionFailure::CornerCountMismatch {
            expected: 63,
            found: 54
        }
    );
}

#[test]
fn blank_image_is_pattern_not_found() {
    let image = PixelBuffer::filled(320, 240, 1, 128);
    let err = ChessboardDetector::default()
        .detect(&image, &CheckerboardSpec::new(9, 6))
        .unwrap_err();
    assert_eq!(err, DetectionFailure::PatternNotFound);
}
