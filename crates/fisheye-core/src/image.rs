use thiserror::Error;

/// Errors raised when constructing a [`PixelBuffer`] from raw parts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid pixel buffer length (expected {expected} bytes, got {got})")]
    LengthMismatch { expected: usize, got: usize },

    #[error("invalid image dimensions (width={width}, height={height}, channels={channels})")]
    InvalidDimensions {
        width: usize,
        height: usize,
        channels: usize,
    },
}

/// Owned interleaved 8-bit image, row-major.
///
/// Moves between pipeline stages; a stage that needs to keep the input
/// around clones it explicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(BufferError::InvalidDimensions {
                width,
                height,
                channels,
            });
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(BufferError::InvalidDimensions {
                width,
                height,
                channels,
            })?;
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Allocate a buffer filled with a constant sample value.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![value; width * height * channels],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, channel: usize) -> u8 {
        self.data[(y * self.width + x) * self.channels + channel]
    }

    /// Borrow a single-channel buffer as a [`GrayView`].
    pub fn gray_view(&self) -> Option<GrayView<'_>> {
        (self.channels == 1).then_some(GrayView {
            width: self.width,
            height: self.height,
            data: &self.data,
        })
    }

    /// Collapse to a single luma channel (Rec. 601 weights for color input).
    pub fn to_gray(&self) -> PixelBuffer {
        match self.channels {
            1 => self.clone(),
            _ => {
                let mut out = Vec::with_capacity(self.width * self.height);
                for px in self.data.chunks_exact(self.channels) {
                    let v = if self.channels >= 3 {
                        0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2])
                    } else {
                        f32::from(px[0])
                    };
                    out.push(v.round().clamp(0.0, 255.0) as u8);
                }
                PixelBuffer {
                    width: self.width,
                    height: self.height,
                    channels: 1,
                    data: out,
                }
            }
        }
    }
}

/// Borrowed single-channel view used by the detector and samplers.
#[derive(Clone, Copy, Debug)]
pub struct GrayView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[inline]
fn get_gray(src: &GrayView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample at a non-integer location; out-of-bounds taps read zero.
#[inline]
pub fn sample_bilinear(src: &GrayView<'_>, x: f64, y: f64) -> f64 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - f64::from(x0);
    let fy = y - f64::from(y0);

    let p00 = f64::from(get_gray(src, x0, y0));
    let p10 = f64::from(get_gray(src, x0 + 1, y0));
    let p01 = f64::from(get_gray(src, x0, y0 + 1));
    let p11 = f64::from(get_gray(src, x0 + 1, y0 + 1));

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_validates_length() {
        let err = PixelBuffer::from_raw(4, 4, 1, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            BufferError::LengthMismatch {
                expected: 16,
                got: 15
            }
        );
        assert!(PixelBuffer::from_raw(4, 4, 1, vec![0; 16]).is_ok());
    }

    #[test]
    fn from_raw_rejects_empty_dimensions() {
        assert!(matches!(
            PixelBuffer::from_raw(0, 4, 1, vec![]),
            Err(BufferError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn to_gray_uses_luma_weights() {
        let buf = PixelBuffer::from_raw(1, 1, 3, vec![255, 0, 0]).unwrap();
        let gray = buf.to_gray();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.get(0, 0, 0), 76); // 0.299 * 255
    }

    #[test]
    fn gray_view_only_for_single_channel() {
        let rgb = PixelBuffer::filled(2, 2, 3, 0);
        assert!(rgb.gray_view().is_none());
        assert!(rgb.to_gray().gray_view().is_some());
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let buf = PixelBuffer::from_raw(2, 1, 1, vec![0, 100]).unwrap();
        let view = buf.gray_view().unwrap();
        assert!((sample_bilinear(&view, 0.5, 0.0) - 50.0).abs() < 1e-9);
        assert!((sample_bilinear(&view, 0.0, 0.0) - 0.0).abs() < 1e-9);
    }
}
