use fisheye_core::{FisheyeCamera, PixelBuffer};
use rayon::prelude::*;

use crate::{BorderMode, UndistortConfig, UndistortMap, UndistortionFailure};

/// Resample `src` through a precomputed backward map.
///
/// Allocates a fresh output buffer; the input is never mutated. Output
/// rows are independent and processed in parallel.
pub fn remap(
    src: &PixelBuffer,
    map: &UndistortMap,
    border: BorderMode,
) -> Result<PixelBuffer, UndistortionFailure> {
    if src.width() != map.src_width || src.height() != map.src_height {
        return Err(UndistortionFailure::SourceSizeMismatch {
            expected_w: map.src_width,
            expected_h: map.src_height,
            got_w: src.width(),
            got_h: src.height(),
        });
    }

    let channels = src.channels();
    let (out_w, out_h) = map.output_size();
    let max_x = (map.src_width - 1) as f32;
    let max_y = (map.src_height - 1) as f32;

    let mut data = vec![0u8; out_w * out_h * channels];
    data.par_chunks_mut(out_w * channels)
        .enumerate()
        .for_each(|(v, row)| {
            for u in 0..out_w {
                let idx = v * out_w + u;
                let sx = map.map_x[idx];
                let sy = map.map_y[idx];
                let inside = sx >= 0.0 && sx <= max_x && sy >= 0.0 && sy <= max_y;
                let pixel = &mut row[u * channels..(u + 1) * channels];
                match (inside, border) {
                    (true, _) => sample_into(src, sx, sy, pixel),
                    (false, BorderMode::Replicate) => {
                        sample_into(src, sx.clamp(0.0, max_x), sy.clamp(0.0, max_y), pixel)
                    }
                    (false, BorderMode::Constant(value)) => pixel.fill(value),
                }
            }
        });

    Ok(PixelBuffer::from_raw(out_w, out_h, channels, data)
        .expect("output buffer sized from the map dimensions"))
}

/// Bilinear sample of every channel at a non-integer source location.
#[inline]
fn sample_into(src: &PixelBuffer, x: f32, y: f32, out: &mut [u8]) {
    let x0 = (x.floor() as usize).min(src.width() - 1);
    let y0 = (y.floor() as usize).min(src.height() - 1);
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    for (c, slot) in out.iter_mut().enumerate() {
        let p00 = f32::from(src.get(x0, y0, c));
        let p10 = f32::from(src.get(x1, y0, c));
        let p01 = f32::from(src.get(x0, y1, c));
        let p11 = f32::from(src.get(x1, y1, c));
        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        *slot = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
}

/// One-shot undistortion: build the map for this image and resample.
///
/// For batches sharing intrinsics and size, build an [`UndistortMap`] once
/// and call [`remap`] per frame instead.
pub fn undistort_image(
    src: &PixelBuffer,
    camera: &FisheyeCamera,
    config: &UndistortConfig,
) -> Result<PixelBuffer, UndistortionFailure> {
    let map = UndistortMap::build(camera, (src.width() as u32, src.height() as u32), config)?;
    remap(src, &map, config.border)
}
