//! Captured frame container.
//!
//! - `Frame`: immutable RGB24 snapshot with capture timestamp.
//!
//! A frame is owned by exactly one stage at a time. There is no `Clone`:
//! the source hands it to the worker, the worker hands it to the delivery
//! channel, and the consumer ends up owning it.

use image::RgbImage;
use std::time::SystemTime;

use crate::error::ScanError;

/// Interleaved RGB, one byte per channel.
pub const BYTES_PER_PIXEL: usize = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Immutable frame snapshot.
///
/// Pixels are private; read access goes through `pixels()`, and the only way to
/// get a modified frame is to consume this one (`mirrored`, `into_rgb_image`).
///
/// ```compile_fail
/// use symbol_scanner::Frame;
///
/// let frame = Frame::new(1, 1, vec![0, 0, 0]).unwrap();
/// let _copy = frame.clone();
/// ```
///
/// ```compile_fail
/// use symbol_scanner::Frame;
///
/// let frame = Frame::new(1, 1, vec![0, 0, 0]).unwrap();
/// let _bytes = frame.pixels;
/// ```
#[derive(Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    captured_at: SystemTime,
}

impl Frame {
    /// Wrap an RGB24 buffer. Fails if the buffer length does not match the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ScanError> {
        Self::with_timestamp(width, height, pixels, SystemTime::now())
    }

    pub fn with_timestamp(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        captured_at: SystemTime,
    ) -> Result<Self, ScanError> {
        if width == 0 || height == 0 {
            return Err(ScanError::InvalidFrame(format!(
                "frame dimensions must be non-zero (got {}x{})",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| ScanError::InvalidFrame("frame dimensions overflow".to_string()))?;
        if pixels.len() != expected {
            return Err(ScanError::InvalidFrame(format!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            captured_at,
        })
    }

    /// Build a frame from a decoded still image (static-image scan path).
    pub fn from_rgb_image(image: RgbImage) -> Result<Self, ScanError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Greyscale copy (ITU-R BT.601 integer weights), row-major, one byte per pixel.
    pub fn luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| {
                let r = px[0] as u32;
                let g = px[1] as u32;
                let b = px[2] as u32;
                ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
            })
            .collect()
    }

    /// Horizontal flip. Keeps the capture timestamp.
    pub fn mirrored(mut self) -> Self {
        let row_len = self.width as usize * BYTES_PER_PIXEL;
        for row in self.pixels.chunks_exact_mut(row_len) {
            let w = self.width as usize;
            for x in 0..w / 2 {
                let left = x * BYTES_PER_PIXEL;
                let right = (w - 1 - x) * BYTES_PER_PIXEL;
                for c in 0..BYTES_PER_PIXEL {
                    row.swap(left + c, right + c);
                }
            }
        }
        self
    }

    /// Hand the pixels over as an `image` buffer (annotation, saving).
    pub fn into_rgb_image(self) -> RgbImage {
        // Length was validated at construction.
        RgbImage::from_raw(self.width, self.height, self.pixels)
            .unwrap_or_else(|| RgbImage::new(0, 0))
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
