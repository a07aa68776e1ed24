//! Symbol Scanner
//!
//! Live barcode/QR acquisition and decoding. A worker thread pulls frames from a
//! camera at a fixed cadence, runs the active decoder backend over each frame,
//! drops payloads already reported in the current session and hands the
//! annotated frame plus the new symbols to a consumer.
//!
//! # Module Structure
//!
//! - `frame`: owned RGB24 frame snapshots
//! - `ingest`: camera providers and frame sources (synthetic, V4L2)
//! - `decode`: decoder backends (`FastRectangular`, `GeneralPurpose`) and their registry
//! - `dedup`: session seen-set
//! - `delivery`: latest-frame-wins channel from worker to consumer
//! - `pipeline`: `Scanner` handle and the capture/decode worker
//! - `annotate`: symbol outlines on delivered frames
//! - `config`: file + environment configuration
//!
//! # Example
//!
//! ```no_run
//! use symbol_scanner::{DecoderRegistry, ScanEvent, ScanOptions, Scanner, SystemCameras};
//!
//! # fn main() -> Result<(), symbol_scanner::ScanError> {
//! let (scanner, events) = Scanner::spawn(SystemCameras, DecoderRegistry::with_builtin())?;
//! scanner.start(ScanOptions::new(0, 640, 480))?;
//! while let Ok(event) = events.recv() {
//!     match event {
//!         ScanEvent::Frame(frame) => {
//!             for symbol in &frame.symbols {
//!                 println!("{}", symbol.label());
//!             }
//!         }
//!         ScanEvent::Error(err) => {
//!             eprintln!("{}", err);
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod annotate;
pub mod config;
pub mod decode;
pub mod dedup;
pub mod delivery;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;

pub use annotate::{annotate, label_anchor};
pub use decode::{
    BackendKind, DecodedSymbol, DecoderRegistry, FastRectangularDecoder, GeneralPurposeDecoder,
    Geometry, Point, SymbolDecoder, SymbolKind, UnknownBackend,
};
pub use dedup::Deduplicator;
pub use delivery::{delivery_channel, DeliveryReceiver, DeliverySender, FrameEvent, ScanEvent};
pub use error::ScanError;
pub use frame::Frame;
pub use ingest::{
    Camera, CameraProvider, CaptureRequest, FrameSource, SyntheticCamera, SystemCameras,
};
pub use pipeline::{PipelineState, PipelineStats, ScanOptions, Scanner, StatsSnapshot};
