mod backend;
mod backends;
mod code128;
mod code39;
mod linear;
mod qr;
mod registry;
mod symbol;

pub use backend::{BackendKind, SymbolDecoder, UnknownBackend};
pub use backends::{FastRectangularDecoder, GeneralPurposeDecoder};
pub use registry::DecoderRegistry;
pub use symbol::{DecodedSymbol, Geometry, Point, SymbolKind};
