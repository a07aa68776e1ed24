use crate::decode::backend::{BackendKind, SymbolDecoder};
use crate::decode::linear::{scan_line, ScanLine, Symbologies};
use crate::decode::qr;
use crate::decode::symbol::{DecodedSymbol, Geometry, Point, SymbolKind};
use crate::error::ScanError;
use crate::frame::Frame;

/// Scan directions in degrees. Lines are read both ways, so half a turn covers all.
const SCAN_ANGLES: [f32; 6] = [0.0, 90.0, 30.0, 150.0, 60.0, 120.0];
/// Lines per direction across the short side of the frame.
const LINES_PER_SIDE: usize = 48;

/// Recall-first backend.
///
/// Reads QR, EAN-13, EAN-8, UPC-A, UPC-E, Code 39 and Code 128. Linear symbols
/// are read along parallel lines in six directions, so rotated and skewed codes
/// still cross some line end to end. QR symbols go through rqrr's adaptive
/// threshold at full resolution. Geometry is a four-point polygon.
#[derive(Clone, Debug, Default)]
pub struct GeneralPurposeDecoder;

impl GeneralPurposeDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Hits of one payload along parallel lines of one direction.
struct Sweep {
    payload: String,
    kind: SymbolKind,
    angle: usize,
    first: (Point, Point),
    last: (Point, Point),
    lines: usize,
}

impl SymbolDecoder for GeneralPurposeDecoder {
    fn name(&self) -> &'static str {
        "general-purpose"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::GeneralPurpose
    }

    fn decode(&self, frame: &Frame) -> Result<Vec<DecodedSymbol>, ScanError> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let luma = frame.luma();

        let mut symbols: Vec<DecodedSymbol> = qr::decode_greyscale(&luma, width, height)
            .into_iter()
            .map(|hit| {
                DecodedSymbol::new(
                    hit.payload,
                    SymbolKind::QrCode,
                    Geometry::Polygon {
                        points: hit.corners.to_vec(),
                    },
                )
            })
            .collect();

        let spacing = (width.min(height) / LINES_PER_SIDE).max(2) as f32;
        let center = (width as f32 / 2.0, height as f32 / 2.0);
        let reach = ((width * width + height * height) as f32).sqrt() / 2.0;
        let offsets = (reach / spacing).ceil() as i32;

        let mut sweeps: Vec<Sweep> = Vec::new();
        for (angle_idx, &angle) in SCAN_ANGLES.iter().enumerate() {
            let (sin, cos) = angle.to_radians().sin_cos();
            let normal = (-sin, cos);
            for k in -offsets..=offsets {
                let through = (
                    center.0 + normal.0 * k as f32 * spacing,
                    center.1 + normal.1 * k as f32 * spacing,
                );
                let Some(line) = ScanLine::clipped(width, height, through, angle) else {
                    continue;
                };
                let samples = line.sample(&luma, width, height);
                for hit in scan_line(&samples, Symbologies::Extended) {
                    let (sx, sy) = line.point(hit.start);
                    let (ex, ey) = line.point(hit.end.saturating_sub(1));
                    let ends = (Point::new(sx, sy), Point::new(ex, ey));
                    match sweeps
                        .iter_mut()
                        .find(|s| s.payload == hit.payload && s.angle == angle_idx)
                    {
                        Some(sweep) => {
                            sweep.last = ends;
                            sweep.lines += 1;
                        }
                        None => sweeps.push(Sweep {
                            payload: hit.payload,
                            kind: hit.kind,
                            angle: angle_idx,
                            first: ends,
                            last: ends,
                            lines: 1,
                        }),
                    }
                }
            }
        }

        // One symbol per payload: the direction that crossed it on the most lines.
        let mut best: Vec<Sweep> = Vec::new();
        for sweep in sweeps {
            match best.iter_mut().find(|b| b.payload == sweep.payload) {
                Some(current) if sweep.lines > current.lines => *current = sweep,
                Some(_) => {}
                None => best.push(sweep),
            }
        }
        symbols.extend(best.into_iter().map(|s| {
            DecodedSymbol::new(
                s.payload,
                s.kind,
                Geometry::Polygon {
                    points: vec![s.first.0, s.first.1, s.last.1, s.last.0],
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
    use crate::decode::code128::tests::code128_modules;
    use crate::decode::code39::tests::code39_modules;
    use crate::decode::linear::tests::{ean13_modules, ean8_modules, upce_modules};
    use crate::decode::qr::tests::render_qr;
    use crate::decode::FastRectangularDecoder;

    /// Greyscale canvas to RGB frame.
    fn frame_from_luma(luma: &[u8], width: u32, height: u32) -> Frame {
        let pixels = luma.iter().flat_map(|&v| [v, v, v]).collect();
        Frame::new(width, height, pixels).unwrap()
    }

    fn canvas_with_qr(payload: &str, width: usize, height: usize) -> Vec<u8> {
        let (qr, size) = render_qr(payload, 5);
        let mut luma = vec![250u8; width * height];
        for y in 0..size {
            for x in 0..size {
                luma[(60 + y) * width + 80 + x] = qr[y * size + x];
            }
        }
        luma
    }

    /// Linear symbol with vertical bars, or horizontal bars when `vertical_bars` is false.
    fn canvas_with_linear(
        modules: &[bool],
        width: usize,
        height: usize,
        vertical_bars: bool,
    ) -> Vec<u8> {
        let mut luma = vec![240u8; width * height];
        let px = 3;
        let start = 40;
        for (m, &dark) in modules.iter().enumerate() {
            if !dark {
                continue;
            }
            for d in 0..px {
                let pos = start + m * px + d;
                for t in 30..90 {
                    let idx = if vertical_bars {
                        t * width + pos
                    } else {
                        pos * width + t
                    };
                    luma[idx] = 10;
                }
            }
        }
        luma
    }

    /// Upright linear symbol with room for its quiet zones.
    fn linear_frame(modules: &[bool]) -> Frame {
        let width = modules.len() * 3 + 80;
        let luma = canvas_with_linear(modules, width, 120, true);
        frame_from_luma(&luma, width as u32, 120)
    }

    fn kinds_and_payloads(symbols: &[DecodedSymbol]) -> Vec<(SymbolKind, &str)> {
        symbols
            .iter()
            .map(|s| (s.kind, s.payload.as_str()))
            .collect()
    }

    #[test]
    fn reads_code39_that_fast_backend_skips() {
        let frame = linear_frame(&code39_modules("A"));
        let general = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(kinds_and_payloads(&general), vec![(SymbolKind::Code39, "A")]);
        assert!(FastRectangularDecoder::new().decode(&frame).unwrap().is_empty());
    }

    #[test]
    fn reads_code128_that_fast_backend_skips() {
        let frame = linear_frame(&code128_modules("Code128"));
        let general = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(
            kinds_and_payloads(&general),
            vec![(SymbolKind::Code128, "Code128")]
        );
        assert!(FastRectangularDecoder::new().decode(&frame).unwrap().is_empty());
    }

    #[test]
    fn reads_upce_that_fast_backend_skips() {
        let frame = linear_frame(&upce_modules("04252614"));
        let general = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(kinds_and_payloads(&general), vec![(SymbolKind::UpcE, "04252614")]);
        assert!(FastRectangularDecoder::new().decode(&frame).unwrap().is_empty());
    }

    #[test]
    fn names_upca_where_fast_backend_reports_ean13() {
        let frame = linear_frame(&ean13_modules("0036000291452"));
        let general = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(
            kinds_and_payloads(&general),
            vec![(SymbolKind::UpcA, "036000291452")]
        );
        let fast = FastRectangularDecoder::new().decode(&frame).unwrap();
        assert_eq!(
            kinds_and_payloads(&fast),
            vec![(SymbolKind::Ean13, "0036000291452")]
        );
    }

    #[test]
    fn decodes_qr_with_polygon_geometry() {
        let luma = canvas_with_qr("HELLO", 400, 300);
        let frame = frame_from_luma(&luma, 400, 300);
        let symbols = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "HELLO");
        match &symbols[0].geometry {
            Geometry::Polygon { points } => assert_eq!(points.len(), 4),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn decodes_mirrored_qr() {
        let luma = canvas_with_qr("HELLO", 400, 300);
        let frame = frame_from_luma(&luma, 400, 300).mirrored();
        let symbols = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "HELLO");
    }

    #[test]
    fn decodes_ean13_rotated_a_quarter_turn() {
        // bars horizontal: only vertical scan lines cross the symbol end to end
        let luma = canvas_with_linear(&ean13_modules("4006381333931"), 120, 400, false);
        let frame = frame_from_luma(&luma, 120, 400);
        let symbols = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "4006381333931");
        assert_eq!(symbols[0].kind, SymbolKind::Ean13);
        match &symbols[0].geometry {
            Geometry::Polygon { points } => assert_eq!(points.len(), 4),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn decodes_ean8() {
        let luma = canvas_with_linear(&ean8_modules("96385074"), 300, 120, true);
        let frame = frame_from_luma(&luma, 300, 120);
        let symbols = GeneralPurposeDecoder::new().decode(&frame).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "96385074");
        assert_eq!(symbols[0].kind, SymbolKind::Ean8);
    }

    #[test]
    fn decode_is_deterministic() {
        let luma = canvas_with_qr("HELLO", 400, 300);
        let decoder = GeneralPurposeDecoder::new();
        let a = decoder.decode(&frame_from_luma(&luma, 400, 300)).unwrap();
        let b = decoder.decode(&frame_from_luma(&luma, 400, 300)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blank_frame_yields_nothing() {
        let frame = Frame::new(64, 48, vec![200u8; 64 * 48 * 3]).unwrap();
        assert!(GeneralPurposeDecoder::new().decode(&frame).unwrap().is_empty());
    }
}
