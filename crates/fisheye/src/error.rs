use thiserror::Error;

/// Errors surfaced by the boundary API.
///
/// Per-sample detection failures are recovered locally (the sample is
/// skipped); everything here is fatal to the request that raised it.
#[derive(Error, Debug)]
pub enum FisheyeError {
    #[error("no usable calibration samples ({total} provided, all skipped)")]
    NoUsableSamples { total: usize },

    #[cfg(feature = "image")]
    #[error("image codec failed: {0}")]
    Codec(#[from] image::ImageError),

    #[error("unsupported output format hint {hint:?}")]
    UnsupportedFormat { hint: String },

    #[error(transparent)]
    InvalidCamera(#[from] fisheye_core::InvalidCamera),

    #[error(transparent)]
    Buffer(#[from] fisheye_core::BufferError),

    #[error(transparent)]
    Calibration(#[from] fisheye_calib::CalibrationFailure),

    #[error(transparent)]
    Undistortion(#[from] fisheye_undistort::UndistortionFailure),
}
