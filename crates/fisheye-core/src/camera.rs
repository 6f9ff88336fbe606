use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural problems with supplied camera parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidCamera {
    #[error("focal lengths must be positive and finite (fx={fx}, fy={fy})")]
    NonPositiveFocal { fx: f64, fy: f64 },

    #[error("principal point must be finite (cx={cx}, cy={cy})")]
    NonFinitePrincipalPoint { cx: f64, cy: f64 },

    #[error("distortion coefficients must be finite")]
    NonFiniteDistortion,
}

/// Pinhole part of the camera: focal lengths and principal point.
///
/// Skew is fixed at zero, as in the calibration this crate family targets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraMatrix {
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self {
            fx: m[(0, 0)],
            fy: m[(1, 1)],
            cx: m[(0, 2)],
            cy: m[(1, 2)],
        }
    }

    pub fn validate(&self) -> Result<(), InvalidCamera> {
        if !(self.fx.is_finite() && self.fy.is_finite() && self.fx > 0.0 && self.fy > 0.0) {
            return Err(InvalidCamera::NonPositiveFocal {
                fx: self.fx,
                fy: self.fy,
            });
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(InvalidCamera::NonFinitePrincipalPoint {
                cx: self.cx,
                cy: self.cy,
            });
        }
        Ok(())
    }
}

/// Equidistant fisheye distortion coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl Distortion {
    pub fn from_array(k: [f64; 4]) -> Self {
        Self {
            k1: k[0],
            k2: k[1],
            k3: k[2],
            k4: k[3],
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.k1, self.k2, self.k3, self.k4]
    }

    pub fn validate(&self) -> Result<(), InvalidCamera> {
        if self.as_array().iter().all(|k| k.is_finite()) {
            Ok(())
        } else {
            Err(InvalidCamera::NonFiniteDistortion)
        }
    }
}

/// Full intrinsic description of a fisheye lens: K plus D.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FisheyeCamera {
    pub k: CameraMatrix,
    pub d: Distortion,
}

impl FisheyeCamera {
    pub fn validate(&self) -> Result<(), InvalidCamera> {
        self.k.validate()?;
        self.d.validate()
    }
}

/// Placement of the checkerboard relative to the camera for one view:
/// Rodrigues rotation vector plus translation, mapping board coordinates
/// into the camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn from_rt(rotation: &Rotation3<f64>, tvec: Vector3<f64>) -> Self {
        Self {
            rvec: rotation.scaled_axis(),
            tvec,
        }
    }

    #[inline]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    /// Transform a board-frame point into the camera frame.
    #[inline]
    pub fn transform(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation() * p + self.tvec
    }
}

/// Terminal output of a calibration run. Immutable once returned; the
/// per-view residuals are diagnostics only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub camera: FisheyeCamera,
    pub poses: Vec<Pose>,
    pub per_view_rms: Vec<f64>,
    pub rms: f64,
    pub iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn camera_matrix_round_trips_through_matrix3() {
        let k = CameraMatrix {
            fx: 410.0,
            fy: 405.0,
            cx: 640.0,
            cy: 360.0,
        };
        assert_eq!(CameraMatrix::from_matrix(&k.to_matrix()), k);
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        let k = CameraMatrix {
            fx: 0.0,
            fy: 400.0,
            cx: 320.0,
            cy: 240.0,
        };
        assert!(matches!(
            k.validate(),
            Err(InvalidCamera::NonPositiveFocal { .. })
        ));

        let d = Distortion {
            k1: f64::NAN,
            ..Distortion::default()
        };
        assert_eq!(d.validate(), Err(InvalidCamera::NonFiniteDistortion));
    }

    #[test]
    fn pose_rotation_round_trips_rvec() {
        let rvec = Vector3::new(0.3, -0.2, 0.9);
        let pose = Pose::new(rvec, Vector3::new(0.5, 0.1, 10.0));
        let back = pose.rotation().scaled_axis();
        assert_relative_eq!(back, rvec, epsilon = 1e-12);
    }
}
