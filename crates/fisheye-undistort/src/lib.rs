//! Undistortion of fisheye images by backward mapping.
//!
//! The per-pixel coordinate map is built once per
//! (intrinsics, source size, config) and can be reused across frames
//! sharing those parameters; resampling is bilinear with a configurable
//! border policy. Inputs are never mutated.

mod config;
mod map;
mod remap;

use fisheye_core::InvalidCamera;
use thiserror::Error;

pub use config::{BorderMode, UndistortConfig};
pub use map::UndistortMap;
pub use remap::{remap, undistort_image};

/// Structural problems detected before any pixel work begins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UndistortionFailure {
    #[error(transparent)]
    InvalidIntrinsics(#[from] InvalidCamera),

    #[error("scale must be positive and finite, got {scale}")]
    InvalidScale { scale: f64 },

    #[error("map built for a {expected_w}x{expected_h} source, image is {got_w}x{got_h}")]
    SourceSizeMismatch {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
}
