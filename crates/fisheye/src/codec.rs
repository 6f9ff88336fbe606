//! Boundary API over encoded image bytes.
//!
//! Decoding and encoding are delegated to the `image` crate, keyed by
//! file-extension-like format hints; the engines themselves only ever see
//! decoded [`PixelBuffer`]s.

use std::io::Cursor;

use fisheye_calib::{calibrate, CalibrateOptions};
use fisheye_chessboard::{ChessboardDetector, DetectionFailure};
use fisheye_core::{
    BufferError, CalibrationResult, CameraMatrix, CheckerboardSpec, CornerSet, Distortion,
    FisheyeCamera, PixelBuffer,
};
use fisheye_undistort::{undistort_image, BorderMode, UndistortConfig};
use image::{DynamicImage, ImageFormat};
use log::{info, warn};
use nalgebra::Matrix3;
use rayon::prelude::*;

use crate::FisheyeError;

/// Options for [`undistort_encoded`].
#[derive(Clone, Debug)]
pub struct UndistortOptions {
    /// Output format, keyed like a file extension (`"png"`, `".jpg"`).
    pub format_hint: String,
    /// Output scale, see [`UndistortConfig`].
    pub scale: f64,
    pub border: BorderMode,
}

impl Default for UndistortOptions {
    fn default() -> Self {
        Self {
            format_hint: "png".to_string(),
            scale: 1.0,
            border: BorderMode::default(),
        }
    }
}

/// Why a calibration sample was left out.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SkipReason {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Detection(#[from] DetectionFailure),

    #[error("image is {got_w}x{got_h}, calibration set is {expected_w}x{expected_h}")]
    DimensionMismatch {
        expected_w: u32,
        expected_h: u32,
        got_w: u32,
        got_h: u32,
    },
}

#[derive(Debug, Clone)]
pub struct SkippedSample {
    pub index: usize,
    pub reason: SkipReason,
}

/// Calibration output plus per-sample bookkeeping for diagnostics.
#[derive(Debug, Clone)]
pub struct CalibrateSummary {
    pub result: CalibrationResult,
    pub total_images: usize,
    pub used_images: usize,
    pub skipped: Vec<SkippedSample>,
}

/// Decode an encoded image into a [`PixelBuffer`] (luma stays luma,
/// everything else becomes RGB).
pub fn decode_pixel_buffer(bytes: &[u8]) -> Result<PixelBuffer, FisheyeError> {
    let decoded = image::load_from_memory(bytes)?;
    let buffer = match decoded {
        DynamicImage::ImageLuma8(gray) => {
            let (w, h) = gray.dimensions();
            PixelBuffer::from_raw(w as usize, h as usize, 1, gray.into_raw())?
        }
        other => {
            let rgb = other.to_rgb8();
            let (w, h) = rgb.dimensions();
            PixelBuffer::from_raw(w as usize, h as usize, 3, rgb.into_raw())?
        }
    };
    Ok(buffer)
}

/// Encode a [`PixelBuffer`] in the given format.
pub fn encode_pixel_buffer(
    buffer: &PixelBuffer,
    format: ImageFormat,
) -> Result<Vec<u8>, FisheyeError> {
    let w = buffer.width() as u32;
    let h = buffer.height() as u32;
    let length_error = |expected: usize| {
        FisheyeError::Buffer(BufferError::LengthMismatch {
            expected,
            got: buffer.data().len(),
        })
    };

    let dynamic = match buffer.channels() {
        1 => image::GrayImage::from_raw(w, h, buffer.data().to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| length_error((w * h) as usize))?,
        3 => image::RgbImage::from_raw(w, h, buffer.data().to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| length_error((w * h * 3) as usize))?,
        _ => {
            let gray = buffer.to_gray();
            image::GrayImage::from_raw(w, h, gray.into_raw())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| length_error((w * h) as usize))?
        }
    };
    // the WebP encoder only takes RGB(A) input
    let dynamic = if format == ImageFormat::WebP && dynamic.color().channel_count() < 3 {
        DynamicImage::ImageRgb8(dynamic.to_rgb8())
    } else {
        dynamic
    };

    let mut out = Cursor::new(Vec::new());
    dynamic.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

fn output_format(hint: &str) -> Result<ImageFormat, FisheyeError> {
    let ext = hint.trim_start_matches('.').to_ascii_lowercase();
    ImageFormat::from_extension(&ext).ok_or_else(|| FisheyeError::UnsupportedFormat {
        hint: hint.to_string(),
    })
}

/// Calibrate from encoded checkerboard photos.
///
/// Samples that fail to decode, differ in size from the first good
/// sample, or yield no corner set are skipped (and reported in the
/// summary); calibration proceeds on the rest, subject to the
/// minimum-view floor of the solver.
pub fn calibrate_images(
    images: &[Vec<u8>],
    cols: u32,
    rows: u32,
) -> Result<CalibrateSummary, FisheyeError> {
    let spec = CheckerboardSpec::new(cols, rows);
    let total = images.len();

    let mut decoded: Vec<(usize, PixelBuffer)> = Vec::new();
    let mut skipped: Vec<SkippedSample> = Vec::new();
    let mut size: Option<(u32, u32)> = None;
    for (index, bytes) in images.iter().enumerate() {
        match decode_pixel_buffer(bytes) {
            Ok(buffer) => {
                let dims = (buffer.width() as u32, buffer.height() as u32);
                match size {
                    Some(expected) if expected != dims => skipped.push(SkippedSample {
                        index,
                        reason: SkipReason::DimensionMismatch {
                            expected_w: expected.0,
                            expected_h: expected.1,
                            got_w: dims.0,
                            got_h: dims.1,
                        },
                    }),
                    _ => {
                        size.get_or_insert(dims);
                        decoded.push((index, buffer));
                    }
                }
            }
            Err(err) => skipped.push(SkippedSample {
                index,
                reason: SkipReason::Decode(err.to_string()),
            }),
        }
    }
    let Some(image_size) = size else {
        return Err(FisheyeError::NoUsableSamples { total });
    };

    // detection is independent per image: fan out, collect in input order
    let detector = ChessboardDetector::default();
    let detections: Vec<(usize, Result<CornerSet, DetectionFailure>)> = decoded
        .par_iter()
        .map(|(index, buffer)| (*index, detector.detect(buffer, &spec)))
        .collect();

    let mut corner_sets = Vec::new();
    for (index, outcome) in detections {
        match outcome {
            Ok(set) => corner_sets.push(set),
            Err(failure) => {
                warn!("sample {index} skipped: {failure}");
                skipped.push(SkippedSample {
                    index,
                    reason: SkipReason::Detection(failure),
                });
            }
        }
    }
    if corner_sets.is_empty() {
        return Err(FisheyeError::NoUsableSamples { total });
    }
    info!("{} of {total} samples usable for calibration", corner_sets.len());

    let used_images = corner_sets.len();
    let result = calibrate(&corner_sets, &spec, image_size, &CalibrateOptions::default())?;
    skipped.sort_by_key(|s| s.index);

    Ok(CalibrateSummary {
        result,
        total_images: total,
        used_images,
        skipped,
    })
}

/// Undistort one encoded image with the supplied K and D.
///
/// Parameters are validated before any decoding or pixel work; the output
/// is re-encoded in the hinted format.
pub fn undistort_encoded(
    bytes: &[u8],
    k: &Matrix3<f64>,
    d: &[f64; 4],
    options: &UndistortOptions,
) -> Result<Vec<u8>, FisheyeError> {
    let format = output_format(&options.format_hint)?;
    let camera = FisheyeCamera {
        k: CameraMatrix::from_matrix(k),
        d: Distortion::from_array(*d),
    };
    camera.validate()?;

    let src = decode_pixel_buffer(bytes)?;
    let config = UndistortConfig {
        scale: options.scale,
        border: options.border,
    };
    let corrected = undistort_image(&src, &camera, &config)?;
    encode_pixel_buffer(&corrected, format)
}
