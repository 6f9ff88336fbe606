use serde::{Deserialize, Serialize};

/// Fill policy for output pixels whose source lies outside the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderMode {
    /// Fill with a constant sample value.
    Constant(u8),
    /// Clamp the source location to the image edge.
    Replicate,
}

impl Default for BorderMode {
    fn default() -> Self {
        BorderMode::Constant(0)
    }
}

/// Undistortion parameters. A plain value, not a mutable resource.
///
/// `scale` multiplies the output canvas and zooms the output camera with
/// it: at 1.0 the corrected image matches the source dimensions with the
/// original camera matrix; larger values keep a smaller, more magnified
/// portion of the field of view (and thus strictly fewer border pixels).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndistortConfig {
    pub scale: f64,
    pub border: BorderMode,
}

impl Default for UndistortConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            border: BorderMode::default(),
        }
    }
}
