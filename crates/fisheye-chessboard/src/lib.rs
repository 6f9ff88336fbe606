//! Checkerboard corner detector for fisheye calibration images.
//!
//! Pipeline:
//! 1. Ring-based corner response over the grayscale image, relative
//!    threshold, non-maximum suppression.
//! 2. Lattice matching: k-NN graph over the candidates, up to four edges
//!    per node, BFS integer-coordinate assignment with locally propagated
//!    grid axes (the lattice bends smoothly under fisheye distortion).
//! 3. Acceptance only for a fully occupied `cols x rows` box (transpose
//!    allowed), canonicalized to row-major image order.
//! 4. Gradient-weighted sub-pixel refinement per corner.
//!
//! Detection is a pure function of the input buffer; failures are local to
//! the one image and reported as [`DetectionFailure`].

mod detector;
mod lattice;
mod params;
mod refine;
mod response;

pub use detector::{ChessboardDetector, DetectionFailure};
pub use params::{DetectorParams, LatticeParams, RefineParams, ResponseParams};
