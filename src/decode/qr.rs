//! QR detection through `rqrr`.
//!
//! Live frames are mirrored for display, which turns a QR symbol into its mirror
//! image. When a grid is located but fails to decode, the image is flipped back
//! and searched again; geometry is mapped back into frame coordinates.

use rqrr::PreparedImage;

use crate::decode::symbol::Point;

/// Decoded QR symbol with its four corners (clockwise from the top-left finder).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct QrHit {
    pub payload: String,
    pub corners: [Point; 4],
}

/// Greyscale search with rqrr's adaptive thresholding.
pub(crate) fn decode_greyscale(luma: &[u8], width: usize, height: usize) -> Vec<QrHit> {
    let (mut hits, failed) = {
        let mut img = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma[y * width + x]
        });
        collect(img.detect_grids().iter().map(|g| {
            (
                g.decode().ok().map(|(_, content)| content),
                std::array::from_fn(|i| Point::new(g.bounds[i].x, g.bounds[i].y)),
            )
        }))
    };
    if failed > 0 {
        let mut img = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma[y * width + (width - 1 - x)]
        });
        let (flipped, _) = collect(img.detect_grids().iter().map(|g| {
            (
                g.decode().ok().map(|(_, content)| content),
                std::array::from_fn(|i| {
                    Point::new(width as i32 - 1 - g.bounds[i].x, g.bounds[i].y)
                }),
            )
        }));
        merge(&mut hits, flipped);
    }
    hits
}

/// Fixed-threshold search on a bitmap (`true` = dark module).
pub(crate) fn decode_bitmap(bits: &[bool], width: usize, height: usize) -> Vec<QrHit> {
    let (mut hits, failed) = {
        let mut img = PreparedImage::prepare_from_bitmap(width, height, |x, y| bits[y * width + x]);
        collect(img.detect_grids().iter().map(|g| {
            (
                g.decode().ok().map(|(_, content)| content),
                std::array::from_fn(|i| Point::new(g.bounds[i].x, g.bounds[i].y)),
            )
        }))
    };
    if failed > 0 {
        let mut img = PreparedImage::prepare_from_bitmap(width, height, |x, y| {
            bits[y * width + (width - 1 - x)]
        });
        let (flipped, _) = collect(img.detect_grids().iter().map(|g| {
            (
                g.decode().ok().map(|(_, content)| content),
                std::array::from_fn(|i| {
                    Point::new(width as i32 - 1 - g.bounds[i].x, g.bounds[i].y)
                }),
            )
        }));
        merge(&mut hits, flipped);
    }
    hits
}

fn collect(grids: impl Iterator<Item = (Option<String>, [Point; 4])>) -> (Vec<QrHit>, usize) {
    let mut hits = Vec::new();
    let mut failed = 0;
    for (content, corners) in grids {
        match content {
            Some(payload) => hits.push(QrHit { payload, corners }),
            None => failed += 1,
        }
    }
    (hits, failed)
}

fn merge(hits: &mut Vec<QrHit>, extra: Vec<QrHit>) {
    for hit in extra {
        if !hits.iter().any(|h| h.payload == hit.payload) {
            hits.push(hit);
        }
    }
}

/// 2x box downscale of a greyscale image.
pub(crate) fn downscale2(luma: &[u8], width: usize, height: usize) -> (Vec<u8>, usize, usize) {
    let w = width / 2;
    let h = height / 2;
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let top = &luma[(2 * y) * width..(2 * y) * width + width];
        let bottom = &luma[(2 * y + 1) * width..(2 * y + 1) * width + width];
        for x in 0..w {
            let sum = top[2 * x] as u16
                + top[2 * x + 1] as u16
                + bottom[2 * x] as u16
                + bottom[2 * x + 1] as u16;
            out.push((sum / 4) as u8);
        }
    }
    (out, w, h)
}

/// Global midpoint threshold; `None` when the image is too flat to hold a symbol.
pub(crate) fn threshold(luma: &[u8], min_contrast: u8) -> Option<Vec<bool>> {
    let min = *luma.iter().min()?;
    let max = *luma.iter().max()?;
    if max.saturating_sub(min) < min_contrast {
        return None;
    }
    let mid = ((min as u16 + max as u16) / 2) as u8;
    Some(luma.iter().map(|&v| v < mid).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use qrcode::{Color, QrCode};

    /// Greyscale QR rendering: `scale` px per module, 4-module quiet zone.
    pub(crate) fn render_qr(payload: &str, scale: usize) -> (Vec<u8>, usize) {
        let code = QrCode::new(payload.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let size = (modules + 8) * scale;
        let mut luma = vec![255u8; size * size];
        for my in 0..modules {
            for mx in 0..modules {
                if colors[my * modules + mx] == Color::Dark {
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let x = (mx + 4) * scale + dx;
                            let y = (my + 4) * scale + dy;
                            luma[y * size + x] = 0;
                        }
                    }
                }
            }
        }
        (luma, size)
    }

    fn mirror(luma: &[u8], size: usize) -> Vec<u8> {
        let mut out = luma.to_vec();
        for row in out.chunks_exact_mut(size) {
            row.reverse();
        }
        out
    }

    #[test]
    fn greyscale_decodes_payload() {
        let (luma, size) = render_qr("HELLO", 6);
        let hits = decode_greyscale(&luma, size, size);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "HELLO");
    }

    #[test]
    fn greyscale_decodes_mirrored_symbol() {
        let (luma, size) = render_qr("HELLO", 6);
        let mirrored = mirror(&luma, size);
        let hits = decode_greyscale(&mirrored, size, size);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "HELLO");
        for corner in hits[0].corners {
            assert!(corner.x >= 0 && corner.x < size as i32);
        }
    }

    #[test]
    fn bitmap_decodes_downscaled_symbol() {
        let (luma, size) = render_qr("https://example.com/item/42", 8);
        let (small, w, h) = downscale2(&luma, size, size);
        let bits = threshold(&small, 48).unwrap();
        let hits = decode_bitmap(&bits, w, h);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, "https://example.com/item/42");
    }

    #[test]
    fn flat_image_has_no_threshold() {
        assert!(threshold(&[128u8; 64], 48).is_none());
    }
}
