use fisheye_core::{CheckerboardSpec, CornerSet, PixelBuffer};
use log::{debug, info};
use nalgebra::Point2;

use crate::lattice::{match_lattice, LatticeOutcome};
use crate::params::DetectorParams;
use crate::refine::refine_corner;
use crate::response::find_candidates;

/// Why one image yielded no usable corner set.
///
/// Local to the sample: calibration treats the image as absent rather
/// than failing the whole run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionFailure {
    #[error("checkerboard pattern not found")]
    PatternNotFound,

    #[error("partial checkerboard: expected {expected} corners, found {found}")]
    CornerCountMismatch { expected: usize, found: usize },
}

/// Checkerboard interior-corner detector.
#[derive(Clone, Debug, Default)]
pub struct ChessboardDetector {
    pub params: DetectorParams,
}

impl ChessboardDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    /// Locate all `spec.cols x spec.rows` interior corners to sub-pixel
    /// precision, in row-major grid order.
    ///
    /// Pure function of the input buffer; color input is collapsed to
    /// luma internally.
    pub fn detect(
        &self,
        image: &PixelBuffer,
        spec: &CheckerboardSpec,
    ) -> Result<CornerSet, DetectionFailure> {
        let expected = spec.corner_count();
        if spec.cols < 2 || spec.rows < 2 {
            return Err(DetectionFailure::PatternNotFound);
        }

        let gray = image.to_gray();
        let view = gray.gray_view().ok_or(DetectionFailure::PatternNotFound)?;

        let candidates = find_candidates(&view, &self.params.response);
        debug!(
            "{} corner candidates in {}x{} image (expecting {expected}, strongest {:.1})",
            candidates.len(),
            view.width,
            view.height,
            candidates.first().map(|c| c.response).unwrap_or(0.0)
        );
        if candidates.len() < expected.min(4) {
            return Err(DetectionFailure::PatternNotFound);
        }

        let coarse: Vec<Point2<f64>> = candidates.iter().map(|c| Point2::new(c.x, c.y)).collect();
        let ordered = match match_lattice(&coarse, spec, &self.params.lattice) {
            LatticeOutcome::Complete(ordered) => ordered,
            LatticeOutcome::Partial(found) => {
                return Err(DetectionFailure::CornerCountMismatch { expected, found })
            }
            LatticeOutcome::NotFound => return Err(DetectionFailure::PatternNotFound),
        };

        let refined: Vec<Point2<f64>> = ordered
            .into_iter()
            .map(|p| refine_corner(&view, p, &self.params.refine))
            .collect();

        info!(
            "checkerboard detected: {} corners refined to sub-pixel",
            refined.len()
        );
        Ok(CornerSet::new(refined))
    }
}
