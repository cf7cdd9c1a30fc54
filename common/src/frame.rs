use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

/// One captured raster image.
///
/// Pixels are 8-bit BGR, row-major, three bytes per pixel. Every source in
/// this workspace hands out BGR regardless of what the device delivers
/// natively; the channel order never varies per source.
///
/// A `Frame` is produced fresh on each capture and owned by the consumer for
/// one iteration only. Sources are free to reuse internal buffers between
/// captures, which is why `capture` returns an owned value instead of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Build a frame from raw BGR bytes. The buffer length must be exactly
    /// `width * height * 3`.
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::BadLength {
                got: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGR pixel bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Encode as JPEG at the given quality (1-100).
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        // The jpeg encoder wants RGB; swizzle out of our BGR order.
        let mut rgb = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }

        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .write_image(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a JPEG back into a BGR frame.
    pub fn from_jpeg(bytes: &[u8]) -> Result<Self, FrameError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(|e| FrameError::Decode(e.to_string()))?;
        let rgb = img.to_rgb8();
        let (width, height) = (rgb.width(), rgb.height());
        let mut data = Vec::with_capacity(rgb.as_raw().len());
        for px in rgb.as_raw().chunks_exact(3) {
            data.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        Self::from_bgr(width, height, data)
    }
}

/// Filename for a capture taken at `at`, e.g. `2026_08_28_14_03_07.jpg`.
pub fn capture_filename(at: DateTime<Utc>) -> String {
    format!("{}.jpg", at.format("%Y_%m_%d_%H_%M_%S"))
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel buffer length mismatch: got {got} bytes, expected {expected}")]
    BadLength { got: usize, expected: usize },
    #[error("JPEG encode failed: {0}")]
    Encode(String),
    #[error("JPEG decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x % 256) as u8);
                data.push((y % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        Frame::from_bgr(width, height, data).unwrap()
    }

    #[test]
    fn from_bgr_rejects_bad_length() {
        let err = Frame::from_bgr(4, 4, vec![0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::BadLength {
                got: 10,
                expected: 48
            }
        ));
    }

    #[test]
    fn jpeg_roundtrip_within_lossy_tolerance() {
        let frame = gradient_frame(64, 48);
        let jpeg = frame.to_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing JPEG SOI marker");

        let decoded = Frame::from_jpeg(&jpeg).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
        let max_diff = frame
            .data()
            .iter()
            .zip(decoded.data())
            .map(|(&a, &b)| (a as i16 - b as i16).unsigned_abs())
            .max()
            .unwrap();
        assert!(max_diff <= 32, "pixels drifted too far: {max_diff}");
    }

    #[test]
    fn capture_filename_format() {
        let at = DateTime::from_timestamp(1708300800, 0).unwrap();
        assert_eq!(capture_filename(at), "2024_02_19_00_00_00.jpg");
    }
}
