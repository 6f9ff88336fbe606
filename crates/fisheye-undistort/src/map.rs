use fisheye_core::{model, CameraMatrix, FisheyeCamera};
use log::debug;
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::{UndistortConfig, UndistortionFailure};

/// Precomputed backward map: for every output pixel, the source location
/// in the distorted input.
///
/// Building the map is the expensive part of undistortion; one map serves
/// any number of frames that share (intrinsics, source size, config).
#[derive(Clone, Debug)]
pub struct UndistortMap {
    pub(crate) out_width: usize,
    pub(crate) out_height: usize,
    pub(crate) src_width: usize,
    pub(crate) src_height: usize,
    pub(crate) map_x: Vec<f32>,
    pub(crate) map_y: Vec<f32>,
}

impl UndistortMap {
    /// Build the map for a distorted source of `src_size` pixels.
    ///
    /// Validates intrinsics and config before any pixel work: no partial
    /// output on structurally bad parameters.
    pub fn build(
        camera: &FisheyeCamera,
        src_size: (u32, u32),
        config: &UndistortConfig,
    ) -> Result<Self, UndistortionFailure> {
        camera.validate()?;
        let s = config.scale;
        if !s.is_finite() || s <= 0.0 {
            return Err(UndistortionFailure::InvalidScale { scale: s });
        }

        let src_width = src_size.0 as usize;
        let src_height = src_size.1 as usize;
        let out_width = ((src_width as f64 * s).round() as usize).max(1);
        let out_height = ((src_height as f64 * s).round() as usize).max(1);

        // Output camera: canvas and principal point scale with s, focal
        // with s^2, so larger scales magnify a narrower field of view.
        // At s = 1 the output camera is exactly the input camera.
        let k_new = CameraMatrix {
            fx: camera.k.fx * s * s,
            fy: camera.k.fy * s * s,
            cx: camera.k.cx * s,
            cy: camera.k.cy * s,
        };
        debug!(
            "building {out_width}x{out_height} undistort map (f' = {:.1} px)",
            k_new.fx
        );

        let mut map_x = vec![0.0f32; out_width * out_height];
        let mut map_y = vec![0.0f32; out_width * out_height];

        map_x
            .par_chunks_mut(out_width)
            .zip(map_y.par_chunks_mut(out_width))
            .enumerate()
            .for_each(|(v, (row_x, row_y))| {
                let y = (v as f64 - k_new.cy) / k_new.fy;
                for (u, (mx, my)) in row_x.iter_mut().zip(row_y.iter_mut()).enumerate() {
                    let x = (u as f64 - k_new.cx) / k_new.fx;
                    let distorted = model::distort_normalized(Vector2::new(x, y), &camera.d);
                    *mx = (camera.k.fx * distorted.x + camera.k.cx) as f32;
                    *my = (camera.k.fy * distorted.y + camera.k.cy) as f32;
                }
            });

        Ok(Self {
            out_width,
            out_height,
            src_width,
            src_height,
            map_x,
            map_y,
        })
    }

    pub fn output_size(&self) -> (usize, usize) {
        (self.out_width, self.out_height)
    }

    /// Share of output pixels whose source location falls inside the
    /// input image. Diagnostic for how much border fill a remap will
    /// produce.
    pub fn valid_source_fraction(&self) -> f64 {
        let max_x = (self.src_width - 1) as f32;
        let max_y = (self.src_height - 1) as f32;
        let valid = self
            .map_x
            .iter()
            .zip(self.map_y.iter())
            .filter(|(&x, &y)| x >= 0.0 && x <= max_x && y >= 0.0 && y <= max_y)
            .count();
        valid as f64 / (self.out_width * self.out_height) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisheye_core::Distortion;

    fn camera() -> FisheyeCamera {
        FisheyeCamera {
            k: CameraMatrix {
                fx: 300.0,
                fy: 300.0,
                cx: 319.5,
                cy: 119.5,
            },
            d: Distortion {
                k1: 0.05,
                k2: 0.0,
                k3: 0.0,
                k4: 0.0,
            },
        }
    }

    #[test]
    fn invalid_intrinsics_fail_before_pixel_work() {
        let mut bad = camera();
        bad.k.fx = -1.0;
        let err = UndistortMap::build(&bad, (640, 240), &UndistortConfig::default()).unwrap_err();
        assert!(matches!(err, UndistortionFailure::InvalidIntrinsics(_)));
    }

    #[test]
    fn invalid_scale_fails_fast() {
        let cfg = UndistortConfig {
            scale: 0.0,
            ..UndistortConfig::default()
        };
        let err = UndistortMap::build(&camera(), (640, 240), &cfg).unwrap_err();
        assert_eq!(err, UndistortionFailure::InvalidScale { scale: 0.0 });
    }

    #[test]
    fn output_canvas_follows_scale() {
        let cfg = UndistortConfig {
            scale: 0.5,
            ..UndistortConfig::default()
        };
        let map = UndistortMap::build(&camera(), (640, 240), &cfg).unwrap();
        assert_eq!(map.output_size(), (320, 120));
    }

    #[test]
    fn valid_fraction_strictly_grows_with_scale() {
        let cam = camera();
        let fractions: Vec<f64> = [0.4, 0.55, 0.7]
            .iter()
            .map(|&scale| {
                let cfg = UndistortConfig {
                    scale,
                    ..UndistortConfig::default()
                };
                UndistortMap::build(&cam, (640, 240), &cfg)
                    .unwrap()
                    .valid_source_fraction()
            })
            .collect();
        assert!(
            fractions[0] < fractions[1] && fractions[1] < fractions[2],
            "expected strictly increasing valid fractions, got {fractions:?}"
        );
        assert!(fractions[0] < 1.0);
    }

    #[test]
    fn identical_builds_are_identical() {
        let cfg = UndistortConfig::default();
        let a = UndistortMap::build(&camera(), (640, 240), &cfg).unwrap();
        let b = UndistortMap::build(&camera(), (640, 240), &cfg).unwrap();
        assert_eq!(a.map_x, b.map_x);
        assert_eq!(a.map_y, b.map_y);
    }
}
