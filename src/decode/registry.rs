use std::collections::HashMap;
use std::sync::Arc;

use crate::decode::backend::{BackendKind, SymbolDecoder};
use crate::decode::backends::{FastRectangularDecoder, GeneralPurposeDecoder};
use crate::decode::symbol::DecodedSymbol;
use crate::error::ScanError;
use crate::frame::Frame;

/// Registry of decoder backends keyed by kind.
///
/// Decoders are immutable, so they are shared as plain `Arc`s between the worker
/// thread and whichever thread calls the one-shot decode.
#[derive(Clone)]
pub struct DecoderRegistry {
    backends: HashMap<BackendKind, Arc<dyn SymbolDecoder>>,
    default_kind: Option<BackendKind>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_kind: None,
        }
    }

    /// Registry with both built-in backends; `GeneralPurpose` is the default.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(GeneralPurposeDecoder::new());
        registry.register(FastRectangularDecoder::new());
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<D: SymbolDecoder + 'static>(&mut self, decoder: D) {
        let kind = decoder.kind();
        if self.default_kind.is_none() {
            self.default_kind = Some(kind);
        }
        self.backends.insert(kind, Arc::new(decoder));
    }

    /// Set default backend.
    pub fn set_default(&mut self, kind: BackendKind) -> Result<(), ScanError> {
        if !self.backends.contains_key(&kind) {
            return Err(ScanError::BackendNotRegistered {
                backend: kind.as_str(),
            });
        }
        self.default_kind = Some(kind);
        Ok(())
    }

    pub fn default_kind(&self) -> Option<BackendKind> {
        self.default_kind
    }

    /// Get backend by kind.
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn SymbolDecoder>> {
        self.backends.get(&kind).cloned()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<_> = self.backends.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.to_u8());
        kinds
    }

    /// Decode with a specific backend.
    pub fn decode_with(
        &self,
        kind: BackendKind,
        frame: &Frame,
    ) -> Result<Vec<DecodedSymbol>, ScanError> {
        let decoder = self.get(kind).ok_or(ScanError::BackendNotRegistered {
            backend: kind.as_str(),
        })?;
        decoder.decode(frame)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
