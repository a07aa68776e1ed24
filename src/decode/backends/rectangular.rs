use crate::decode::backend::{BackendKind, SymbolDecoder};
use crate::decode::linear::{scan_line, Symbologies};
use crate::decode::qr;
use crate::decode::symbol::{DecodedSymbol, Geometry, Point, SymbolKind};
use crate::error::ScanError;
use crate::frame::Frame;

/// Horizontal scan bands per frame.
const SCAN_BANDS: usize = 16;
/// Frames whose short side reaches this are searched for QR at half resolution.
const DOWNSCALE_MIN_SIDE: u32 = 480;
const QR_MIN_CONTRAST: u8 = 48;

/// Latency-first backend for axis-aligned codes.
///
/// Reads QR, EAN-13 and EAN-8 only. Linear symbols are read on a fixed set of
/// horizontal bands; QR symbols on a globally thresholded bitmap, downscaled
/// for large frames. All geometry is an axis-aligned rectangle in frame
/// coordinates.
#[derive(Clone, Debug, Default)]
pub struct FastRectangularDecoder;

impl FastRectangularDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Bounds of one linear payload across the bands that read it.
struct Track {
    payload: String,
    kind: SymbolKind,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl SymbolDecoder for FastRectangularDecoder {
    fn name(&self) -> &'static str {
        "fast-rectangular"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::FastRectangular
    }

    fn decode(&self, frame: &Frame) -> Result<Vec<DecodedSymbol>, ScanError> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let luma = frame.luma();

        let mut symbols = Vec::new();

        let scale = if frame.width().min(frame.height()) >= DOWNSCALE_MIN_SIDE {
            2
        } else {
            1
        };
        let (small, sw, sh) = if scale == 2 {
            qr::downscale2(&luma, width, height)
        } else {
            (luma.clone(), width, height)
        };
        if let Some(bits) = qr::threshold(&small, QR_MIN_CONTRAST) {
            for hit in qr::decode_bitmap(&bits, sw, sh) {
                let corners = hit.corners.map(|p| Point::new(p.x * scale, p.y * scale));
                symbols.push(DecodedSymbol::new(
                    hit.payload,
                    SymbolKind::QrCode,
                    Geometry::bounding(&corners),
                ));
            }
        }

        let mut tracks: Vec<Track> = Vec::new();
        for band in 0..SCAN_BANDS {
            let y = ((2 * band + 1) * height) / (2 * SCAN_BANDS);
            let row = &luma[y * width..(y + 1) * width];
            for hit in scan_line(row, Symbologies::Retail) {
                match tracks.iter_mut().find(|t| t.payload == hit.payload) {
                    Some(track) => {
                        track.x0 = track.x0.min(hit.start);
                        track.x1 = track.x1.max(hit.end);
                        track.y1 = y;
                    }
                    None => tracks.push(Track {
                        payload: hit.payload,
                        kind: hit.kind,
                        x0: hit.start,
                        x1: hit.end,
                        y0: y,
                        y1: y,
                    }),
                }
            }
        }
        symbols.extend(tracks.into_iter().map(|t| {
            DecodedSymbol::new(
                t.payload,
                t.kind,
                Geometry::Rect {
                    x: t.x0 as i32,
                    y: t.y0 as i32,
                    width: (t.x1 - t.x0) as u32,
                    height: (t.y1 - t.y0 + 1) as u32,
                },
            )
        }));

        log::trace!("{}: {} symbol(s)", self.name(), symbols.len());
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::linear::tests::ean13_modules;
    use crate::decode::qr::tests::render_qr;

    fn ean13_frame(payload: &str, width: u32, height: u32, px: usize, left: usize) -> Frame {
        let modules = ean13_modules(payload);
        let mut pixels = vec![235u8; (width * height * 3) as usize];
        for y in 0..height as usize {
            for (m, &dark) in modules.iter().enumerate() {
                if !dark {
                    continue;
                }
                for dx in 0..px {
                    let x = left + m * px + dx;
                    let i = (y * width as usize + x) * 3;
                    pixels[i..i + 3].copy_from_slice(&[15, 15, 15]);
                }
            }
        }
        Frame::new(width, height, pixels).unwrap()
    }

    fn qr_frame(payload: &str, width: u32, height: u32, scale: usize) -> Frame {
        let (luma, size) = render_qr(payload, scale);
        let mut pixels = vec![255u8; (width * height * 3) as usize];
        let ox = 40;
        let oy = 30;
        for y in 0..size {
            for x in 0..size {
                let v = luma[y * size + x];
                let i = ((oy + y) * width as usize + ox + x) * 3;
                pixels[i..i + 3].copy_from_slice(&[v, v, v]);
            }
        }
        Frame::new(width, height, pixels).unwrap()
    }

    #[test]
    fn decodes_ean13_with_rect_geometry() {
        let frame = ean13_frame("5901234123457", 400, 120, 3, 50);
        let symbols = FastRectangularDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "5901234123457");
        assert_eq!(symbols[0].kind, SymbolKind::Ean13);
        match &symbols[0].geometry {
            Geometry::Rect { x, width, .. } => {
                assert_eq!(*x, 50);
                assert_eq!(*width, 95 * 3);
            }
            other => panic!("expected rect geometry, got {:?}", other),
        }
    }

    #[test]
    fn decodes_mirrored_ean13() {
        let frame = ean13_frame("5901234123457", 400, 120, 3, 50).mirrored();
        let symbols = FastRectangularDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "5901234123457");
    }

    #[test]
    fn decodes_qr_on_downscaled_frame() {
        let frame = qr_frame("HELLO", 640, 480, 6);
        let symbols = FastRectangularDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "HELLO");
        assert_eq!(symbols[0].kind, SymbolKind::QrCode);
        assert!(matches!(symbols[0].geometry, Geometry::Rect { .. }));
    }

    #[test]
    fn decode_is_deterministic() {
        let decoder = FastRectangularDecoder::new();
        let a = decoder.decode(&qr_frame("HELLO", 640, 480, 6)).unwrap();
        let b = decoder.decode(&qr_frame("HELLO", 640, 480, 6)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blank_frame_yields_nothing() {
        let frame = Frame::new(320, 240, vec![128u8; 320 * 240 * 3]).unwrap();
        assert!(FastRectangularDecoder::new().decode(&frame).unwrap().is_empty());
    }
}
