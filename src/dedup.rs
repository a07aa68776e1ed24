//! Session-scoped suppression of repeat reports.
//!
//! Symbols are compared by payload only; kind and geometry are ignored, so the
//! same text read as two different symbologies counts as one event.

use std::collections::HashSet;

use crate::decode::DecodedSymbol;

#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only symbols whose payload has not been reported this session,
    /// and remember them. Duplicates inside one batch collapse to the first.
    pub fn filter(&mut self, symbols: Vec<DecodedSymbol>) -> Vec<DecodedSymbol> {
        symbols
            .into_iter()
            .filter(|symbol| self.seen.insert(symbol.payload.clone()))
            .collect()
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.seen.contains(payload)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{Geometry, SymbolKind};

    fn symbol(payload: &str, kind: SymbolKind) -> DecodedSymbol {
        DecodedSymbol::new(
            payload,
            kind,
            Geometry::Rect {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
        )
    }

    fn payloads(symbols: &[DecodedSymbol]) -> Vec<&str> {
        symbols.iter().map(|s| s.payload.as_str()).collect()
    }

    #[test]
    fn reports_each_payload_once() {
        let mut dedup = Deduplicator::new();
        let first = dedup.filter(vec![symbol("HELLO", SymbolKind::QrCode)]);
        let second = dedup.filter(vec![symbol("HELLO", SymbolKind::QrCode)]);
        assert_eq!(payloads(&first), vec!["HELLO"]);
        assert!(second.is_empty());
        assert!(dedup.contains("HELLO"));
    }

    #[test]
    fn kind_does_not_distinguish_payloads() {
        let mut dedup = Deduplicator::new();
        let out = dedup.filter(vec![
            symbol("12345670", SymbolKind::Ean8),
            symbol("12345670", SymbolKind::QrCode),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SymbolKind::Ean8);
    }

    #[test]
    fn reset_allows_repeat() {
        let mut dedup = Deduplicator::new();
        dedup.filter(vec![symbol("HELLO", SymbolKind::QrCode)]);
        dedup.reset();
        assert!(dedup.is_empty());
        let again = dedup.filter(vec![symbol("HELLO", SymbolKind::QrCode)]);
        assert_eq!(payloads(&again), vec!["HELLO"]);
    }

    #[test]
    fn cumulative_output_has_no_repeats() {
        let mut dedup = Deduplicator::new();
        let batches = [
            vec!["a", "b"],
            vec!["b", "c", "a"],
            vec!["d", "d"],
            vec!["c"],
        ];
        let mut reported = Vec::new();
        for batch in batches {
            let symbols = batch
                .iter()
                .map(|p| symbol(p, SymbolKind::QrCode))
                .collect();
            reported.extend(dedup.filter(symbols).into_iter().map(|s| s.payload));
        }
        assert_eq!(reported, vec!["a", "b", "c", "d"]);
        assert_eq!(dedup.len(), 4);
    }
}
