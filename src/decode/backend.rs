use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::decode::symbol::DecodedSymbol;
use crate::error::ScanError;
use crate::frame::Frame;

/// Selects the active decoder backend. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Axis-aligned codes, rectangle geometry, latency over sensitivity.
    FastRectangular,
    /// Broader coverage, polygon geometry, tolerates rotation and mirroring.
    #[default]
    GeneralPurpose,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::FastRectangular, BackendKind::GeneralPurpose];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::FastRectangular => "fast-rectangular",
            BackendKind::GeneralPurpose => "general-purpose",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            BackendKind::FastRectangular => 0,
            BackendKind::GeneralPurpose => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => BackendKind::FastRectangular,
            _ => BackendKind::GeneralPurpose,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown backend '{0}' (expected fast-rectangular or general-purpose)")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "fast-rectangular" | "fast_rectangular" | "fastrectangular" => {
                Ok(BackendKind::FastRectangular)
            }
            "general" | "general-purpose" | "general_purpose" | "generalpurpose" => {
                Ok(BackendKind::GeneralPurpose)
            }
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Symbol decoder backend.
///
/// Decoding is total on well-formed frames: zero symbols is a valid answer and
/// an `Err` means the backend broke its contract (reported as `DecodeFailure`).
/// Implementations are pure functions of the frame bytes, so one instance can be
/// shared between the worker and a consumer calling `decode_once`.
pub trait SymbolDecoder: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn kind(&self) -> BackendKind;

    /// Decode every symbol visible in the frame.
    fn decode(&self, frame: &Frame) -> Result<Vec<DecodedSymbol>, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!(
            "fast".parse::<BackendKind>().unwrap(),
            BackendKind::FastRectangular
        );
        assert_eq!(
            "General-Purpose".parse::<BackendKind>().unwrap(),
            BackendKind::GeneralPurpose
        );
        assert!("zbar".parse::<BackendKind>().is_err());
    }

    #[test]
    fn u8_encoding_is_stable() {
        for kind in BackendKind::ALL {
            assert_eq!(BackendKind::from_u8(kind.to_u8()), kind);
        }
    }
}
