use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Interior-corner layout of the physical checkerboard.
///
/// `cols` and `rows` count the *interior* grid intersections, not the
/// squares. The square side is normalized to one unit: absolute scale is
/// unobservable from images alone and is not needed for undistortion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerboardSpec {
    pub cols: u32,
    pub rows: u32,
}

impl CheckerboardSpec {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    #[inline]
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// Sub-pixel corner locations for one view, in row-major grid order.
///
/// The detector guarantees `points.len() == spec.corner_count()`; a view
/// that cannot satisfy that is rejected, never truncated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerSet {
    pub points: Vec<Point2<f64>>,
}

impl CornerSet {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Reference 3D grid for the checkerboard: z = 0, x = column, y = row,
/// matching the row-major ordering of [`CornerSet`].
pub fn object_grid(spec: &CheckerboardSpec) -> Vec<Vector3<f64>> {
    let mut grid = Vec::with_capacity(spec.corner_count());
    for row in 0..spec.rows {
        for col in 0..spec.cols {
            grid.push(Vector3::new(f64::from(col), f64::from(row), 0.0));
        }
    }
    grid
}
