//! Core types and numerical primitives shared by the fisheye-rs crates.
//!
//! This crate is intentionally small and purely numeric. It does *not*
//! depend on any image codec, CLI machinery, or concrete detector.

mod board;
mod camera;
mod homography;
mod image;
mod logger;
pub mod model;

pub use board::{object_grid, CheckerboardSpec, CornerSet};
pub use camera::{
    CalibrationResult, CameraMatrix, Distortion, FisheyeCamera, InvalidCamera, Pose,
};
pub use homography::estimate_homography;
pub use image::{sample_bilinear, BufferError, GrayView, PixelBuffer};
pub use logger::init_with_level;
