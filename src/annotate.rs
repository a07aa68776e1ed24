//! Symbol outlines drawn onto live frames.
//!
//! Only outlines are drawn. The `payload (KIND)` caption is left to the
//! consumer, placed at [`label_anchor`].

use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;

use crate::decode::{DecodedSymbol, Geometry, Point};
use crate::error::ScanError;
use crate::frame::Frame;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
/// Offsets stacked under each edge to get a 2 px stroke.
const STROKE: [(f32, f32); 3] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
/// Caption baseline distance above a symbol's outline.
const LABEL_RISE: i32 = 10;

/// Outline every symbol in green. Consumes the frame and keeps its timestamp.
pub fn annotate(frame: Frame, symbols: &[DecodedSymbol]) -> Result<Frame, ScanError> {
    if symbols.is_empty() {
        return Ok(frame);
    }
    let captured_at = frame.captured_at();
    let mut image = frame.into_rgb_image();
    for symbol in symbols {
        let outline = symbol.geometry.outline();
        for (i, from) in outline.iter().enumerate() {
            let to = outline[(i + 1) % outline.len()];
            for (dx, dy) in STROKE {
                draw_line_segment_mut(
                    &mut image,
                    (from.x as f32 + dx, from.y as f32 + dy),
                    (to.x as f32 + dx, to.y as f32 + dy),
                    OUTLINE,
                );
            }
        }
    }
    let (width, height) = image.dimensions();
    Frame::with_timestamp(width, height, image.into_raw(), captured_at)
}

/// Baseline origin for a symbol's caption: above the top-left corner of its
/// bounding box, never above the top edge of the frame.
pub fn label_anchor(symbol: &DecodedSymbol) -> Point {
    match Geometry::bounding(&symbol.geometry.outline()) {
        Geometry::Rect { x, y, .. } => Point::new(x.max(0), (y - LABEL_RISE).max(0)),
        Geometry::Polygon { .. } => Point::new(0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::SymbolKind;

    fn white(width: u32, height: u32) -> Frame {
        Frame::new(width, height, vec![255u8; (width * height * 3) as usize]).unwrap()
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.width() + x) * 3) as usize;
        [frame.pixels()[i], frame.pixels()[i + 1], frame.pixels()[i + 2]]
    }

    #[test]
    fn draws_rect_outline() {
        let symbol = DecodedSymbol::new(
            "X",
            SymbolKind::QrCode,
            Geometry::Rect {
                x: 4,
                y: 4,
                width: 10,
                height: 6,
            },
        );
        let out = annotate(white(20, 20), &[symbol]).unwrap();
        assert_eq!(pixel(&out, 4, 4), [0, 255, 0]);
        assert_eq!(pixel(&out, 9, 4), [0, 255, 0]);
        assert_eq!(pixel(&out, 9, 5), [0, 255, 0]);
        assert_eq!(pixel(&out, 9, 7), [255, 255, 255]);
        assert_eq!(pixel(&out, 0, 0), [255, 255, 255]);
    }

    #[test]
    fn clips_polygon_outside_frame() {
        let symbol = DecodedSymbol::new(
            "X",
            SymbolKind::Ean13,
            Geometry::Polygon {
                points: vec![
                    Point::new(-5, -5),
                    Point::new(30, -5),
                    Point::new(30, 30),
                    Point::new(-5, 30),
                ],
            },
        );
        let out = annotate(white(10, 10), &[symbol]).unwrap();
        assert_eq!((out.width(), out.height()), (10, 10));
    }

    #[test]
    fn keeps_timestamp() {
        let frame = white(8, 8);
        let stamp = frame.captured_at();
        let symbol = DecodedSymbol::new(
            "X",
            SymbolKind::QrCode,
            Geometry::bounding(&[Point::new(1, 1), Point::new(5, 5)]),
        );
        assert_eq!(annotate(frame, &[symbol]).unwrap().captured_at(), stamp);
    }

    #[test]
    fn label_sits_above_top_left_corner() {
        let symbol = DecodedSymbol::new(
            "HELLO",
            SymbolKind::QrCode,
            Geometry::Polygon {
                points: vec![
                    Point::new(40, 52),
                    Point::new(90, 50),
                    Point::new(92, 100),
                    Point::new(38, 98),
                ],
            },
        );
        assert_eq!(label_anchor(&symbol), Point::new(38, 40));
    }

    #[test]
    fn label_stays_inside_top_edge() {
        let symbol = DecodedSymbol::new(
            "X",
            SymbolKind::Code128,
            Geometry::Rect {
                x: -3,
                y: 4,
                width: 20,
                height: 8,
            },
        );
        assert_eq!(label_anchor(&symbol), Point::new(0, 0));
    }
}
