//! Error taxonomy shared by every pipeline stage.
//!
//! Errors are values: they cross the worker/consumer boundary through the
//! delivery channel, so they are `Clone` and carry owned context only.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// Opening the capture device failed (missing, busy, or unsupported).
    #[error("camera device {index} unavailable: {reason}")]
    DeviceUnavailable { index: u32, reason: String },

    /// The device is open but no frame arrived within the read budget.
    #[error("camera device {index} produced no frame within {waited_ms} ms")]
    ReadTimeout { index: u32, waited_ms: u64 },

    /// A decoder backend broke its contract on a well-formed frame.
    #[error("decoder backend {backend} failed: {reason}")]
    DecodeFailure {
        backend: &'static str,
        reason: String,
    },

    /// A control call named a backend the registry does not hold.
    #[error("decoder backend {backend} is not registered")]
    BackendNotRegistered { backend: &'static str },

    /// Frame dimensions and pixel buffer disagree.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The pipeline worker thread could not be spawned or has exited.
    #[error("pipeline worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl ScanError {
    pub fn device_unavailable(index: u32, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            index,
            reason: reason.into(),
        }
    }

    /// Short tag for log lines and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable { .. } => "device_unavailable",
            Self::ReadTimeout { .. } => "read_timeout",
            Self::DecodeFailure { .. } => "decode_failure",
            Self::BackendNotRegistered { .. } => "backend_not_registered",
            Self::InvalidFrame(_) => "invalid_frame",
            Self::WorkerUnavailable(_) => "worker_unavailable",
        }
    }
}
