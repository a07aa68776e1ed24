use serde::Serialize;
use std::fmt;

/// Barcode/QR standard a symbol was decoded as.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    #[serde(rename = "QRCODE")]
    QrCode,
    #[serde(rename = "EAN13")]
    Ean13,
    #[serde(rename = "EAN8")]
    Ean8,
    #[serde(rename = "UPCA")]
    UpcA,
    #[serde(rename = "UPCE")]
    UpcE,
    #[serde(rename = "CODE39")]
    Code39,
    #[serde(rename = "CODE128")]
    Code128,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::QrCode => "QRCODE",
            SymbolKind::Ean13 => "EAN13",
            SymbolKind::Ean8 => "EAN8",
            SymbolKind::UpcA => "UPCA",
            SymbolKind::UpcE => "UPCE",
            SymbolKind::Code39 => "CODE39",
            SymbolKind::Code128 => "CODE128",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel coordinate in display orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Where a symbol sits in the frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// Axis-aligned box.
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    /// Ordered outline, at least four points.
    Polygon { points: Vec<Point> },
}

impl Geometry {
    /// Smallest axis-aligned box containing a set of points.
    pub fn bounding(points: &[Point]) -> Self {
        let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
        let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
        let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
        Geometry::Rect {
            x: min_x,
            y: min_y,
            width: (max_x - min_x) as u32 + 1,
            height: (max_y - min_y) as u32 + 1,
        }
    }

    /// Outline as a closed sequence of corners.
    pub fn outline(&self) -> Vec<Point> {
        match self {
            Geometry::Rect {
                x,
                y,
                width,
                height,
            } => {
                let right = x + *width as i32 - 1;
                let bottom = y + *height as i32 - 1;
                vec![
                    Point::new(*x, *y),
                    Point::new(right, *y),
                    Point::new(right, bottom),
                    Point::new(*x, bottom),
                ]
            }
            Geometry::Polygon { points } => points.clone(),
        }
    }
}

/// One decoded symbol. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DecodedSymbol {
    pub payload: String,
    pub kind: SymbolKind,
    pub geometry: Geometry,
}

impl DecodedSymbol {
    pub fn new(payload: impl Into<String>, kind: SymbolKind, geometry: Geometry) -> Self {
        Self {
            payload: payload.into(),
            kind,
            geometry,
        }
    }

    /// `payload (KIND)`, the result line format.
    pub fn label(&self) -> String {
        format!("{} ({})", self.payload, self.kind)
    }
}
