//! High-level facade for the `fisheye-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the detector, solver, and mapper crates
//! - (feature `image`, default on) the boundary API over encoded image
//!   bytes: [`calibrate_images`] and [`undistort_encoded`]
//! - (feature `cli`, default on) the `fisheye` command-line tool
//!
//! ## Quickstart
//!
//! ```no_run
//! # fn main() -> Result<(), fisheye::FisheyeError> {
//! let samples: Vec<Vec<u8>> = vec![/* encoded checkerboard photos */];
//! let summary = fisheye::calibrate_images(&samples, 9, 6)?;
//! println!(
//!     "rms {:.3} px from {}/{} samples",
//!     summary.result.rms, summary.used_images, summary.total_images
//! );
//!
//! let photo = std::fs::read("distorted.jpg").unwrap();
//! let corrected = fisheye::undistort_encoded(
//!     &photo,
//!     &summary.result.camera.k.to_matrix(),
//!     &summary.result.camera.d.as_array(),
//!     &fisheye::UndistortOptions::default(),
//! )?;
//! std::fs::write("corrected.png", corrected).unwrap();
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `fisheye::core`: data model (pixel buffers, corner sets, cameras).
//! - `fisheye::chessboard`: checkerboard corner detection.
//! - `fisheye::calib`: joint intrinsic calibration.
//! - `fisheye::undistort`: backward-mapping undistortion.

pub use fisheye_calib as calib;
pub use fisheye_chessboard as chessboard;
pub use fisheye_core as core;
pub use fisheye_undistort as undistort;

pub use fisheye_calib::{CalibrateOptions, CalibrationFailure};
pub use fisheye_chessboard::{ChessboardDetector, DetectionFailure, DetectorParams};
pub use fisheye_core::{
    CalibrationResult, CameraMatrix, CheckerboardSpec, CornerSet, Distortion, FisheyeCamera,
    PixelBuffer,
};
pub use fisheye_undistort::{BorderMode, UndistortConfig, UndistortionFailure};

mod error;
pub use error::FisheyeError;

#[cfg(feature = "image")]
mod codec;
#[cfg(feature = "image")]
pub use codec::{
    calibrate_images, decode_pixel_buffer, encode_pixel_buffer, undistort_encoded,
    CalibrateSummary, SkipReason, SkippedSample, UndistortOptions,
};
