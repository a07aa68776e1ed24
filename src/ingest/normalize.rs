use anyhow::{anyhow, Result};
use std::borrow::Cow;

/// Capture layouts a V4L2 device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv,
}

impl PixelFormat {
    fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Yuyv => 2,
        }
    }

    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"BGR3" => Some(Self::Bgr24),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

/// Convert a captured buffer to packed RGB24.
///
/// `stride` is the driver's bytes per line; zero means rows are tightly packed.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    let row_bytes = width as usize * format.bytes_per_pixel();
    let pixels = strip_row_padding(pixels, row_bytes, stride as usize, height as usize)?;
    let pixels = pixels.as_ref();
    match format {
        PixelFormat::Rgb24 => Ok(packed(pixels, pixel_count, "RGB")?.to_vec()),
        PixelFormat::Bgr24 => {
            let mut rgb = packed(pixels, pixel_count, "BGR")?.to_vec();
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(rgb)
        }
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width as usize, pixel_count),
    }
}

/// Drop the per-line padding some drivers add after each row.
fn strip_row_padding(
    pixels: &[u8],
    row_bytes: usize,
    stride: usize,
    height: usize,
) -> Result<Cow<'_, [u8]>> {
    if stride == 0 || stride == row_bytes || height == 0 {
        return Ok(Cow::Borrowed(pixels));
    }
    if stride < row_bytes {
        return Err(anyhow!(
            "line stride {} is shorter than a row of {} bytes",
            stride,
            row_bytes
        ));
    }
    // the last row need not carry its padding
    let needed = stride * (height - 1) + row_bytes;
    if pixels.len() < needed {
        return Err(anyhow!(
            "padded frame length mismatch: expected {}, got {}",
            needed,
            pixels.len()
        ));
    }
    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let at = row * stride;
        packed.extend_from_slice(&pixels[at..at + row_bytes]);
    }
    Ok(Cow::Owned(packed))
}

/// Packed 24-bit buffers; drivers may pad the final buffer, so only a short one is an error.
fn packed<'a>(pixels: &'a [u8], pixel_count: usize, name: &str) -> Result<&'a [u8]> {
    let expected = pixel_count
        .checked_mul(3)
        .ok_or_else(|| anyhow!("{} frame dimensions overflow", name))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            name,
            expected,
            pixels.len()
        ));
    }
    Ok(&pixels[..expected])
}

fn yuyv_to_rgb(pixels: &[u8], width: usize, pixel_count: usize) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width must be even, got {}", width));
    }
    let expected = pixel_count * 2;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    // Each 4-byte macropixel is Y0 U Y1 V: two pixels sharing chroma.
    for macro_px in pixels[..expected].chunks_exact(4) {
        let u = macro_px[1] as f32 - 128.0;
        let v = macro_px[3] as f32 - 128.0;
        for y in [macro_px[0], macro_px[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }
    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_neutral_chroma_is_gray() -> Result<()> {
        let yuyv = vec![128u8, 128, 90, 128];
        let rgb = normalize_to_rgb(&yuyv, 2, 1, 0, PixelFormat::Yuyv)?;
        assert_eq!(rgb, vec![128, 128, 128, 90, 90, 90]);
        Ok(())
    }

    #[test]
    fn bgr_channels_are_swapped() -> Result<()> {
        let rgb = normalize_to_rgb(&[1, 2, 3], 1, 1, 3, PixelFormat::Bgr24)?;
        assert_eq!(rgb, vec![3, 2, 1]);
        Ok(())
    }

    #[test]
    fn rgb_pass_through_validates_length() -> Result<()> {
        let pixels = vec![1u8; 9];
        let rgb = normalize_to_rgb(&pixels, 1, 3, 0, PixelFormat::Rgb24)?;
        assert_eq!(rgb, pixels);
        assert!(normalize_to_rgb(&pixels[..8], 1, 3, 0, PixelFormat::Rgb24).is_err());
        Ok(())
    }

    #[test]
    fn padded_rows_are_stripped() -> Result<()> {
        // 2x2 RGB with 8 bytes per line: two pad bytes after each row
        let pixels = vec![
            1, 1, 1, 2, 2, 2, 0xEE, 0xEE, //
            3, 3, 3, 4, 4, 4, 0xEE, 0xEE,
        ];
        let rgb = normalize_to_rgb(&pixels, 2, 2, 8, PixelFormat::Rgb24)?;
        assert_eq!(rgb, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);

        // last row without its padding is still complete
        let rgb = normalize_to_rgb(&pixels[..14], 2, 2, 8, PixelFormat::Rgb24)?;
        assert_eq!(rgb.len(), 12);
        Ok(())
    }

    #[test]
    fn padded_yuyv_rows_are_stripped() -> Result<()> {
        let yuyv = vec![
            100, 128, 100, 128, 0, 0, //
            50, 128, 50, 128, 0, 0,
        ];
        let rgb = normalize_to_rgb(&yuyv, 2, 2, 6, PixelFormat::Yuyv)?;
        assert_eq!(rgb, vec![100, 100, 100, 100, 100, 100, 50, 50, 50, 50, 50, 50]);
        Ok(())
    }

    #[test]
    fn stride_shorter_than_row_is_rejected() {
        assert!(normalize_to_rgb(&[0u8; 12], 2, 2, 4, PixelFormat::Rgb24).is_err());
    }

    #[test]
    fn fourcc_lookup() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }
}
