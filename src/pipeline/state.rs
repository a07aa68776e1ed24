//! Pipeline status shared between the worker and its handle.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::decode::BackendKind;

/// Lifecycle of a scan session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Stopping,
    /// Transient: entered when a session fails, always followed by `Idle`.
    Error,
}

impl PipelineState {
    fn to_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Starting => 1,
            PipelineState::Running => 2,
            PipelineState::Stopping => 3,
            PipelineState::Error => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Starting,
            2 => PipelineState::Running,
            3 => PipelineState::Stopping,
            4 => PipelineState::Error,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Counters for one scanner.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_captured: AtomicU64,
    pub frames_delivered: AtomicU64,
    pub symbols_reported: AtomicU64,
    pub dedup_resets: AtomicU64,
    pub device_opens: AtomicU64,
    pub device_closes: AtomicU64,
    pub errors: AtomicU64,
}

impl PipelineStats {
    pub fn record_capture(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, new_symbols: usize) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.symbols_reported
            .fetch_add(new_symbols as u64, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.dedup_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open(&self) {
        self.device_opens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.device_closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            symbols_reported: self.symbols_reported.load(Ordering::Relaxed),
            dedup_resets: self.dedup_resets.load(Ordering::Relaxed),
            device_opens: self.device_opens.load(Ordering::Relaxed),
            device_closes: self.device_closes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_delivered: u64,
    pub symbols_reported: u64,
    pub dedup_resets: u64,
    pub device_opens: u64,
    pub device_closes: u64,
    pub errors: u64,
}

/// Written only by the worker; read from anywhere.
#[derive(Debug)]
pub(crate) struct SharedStatus {
    state: AtomicU8,
    backend: AtomicU8,
    pub(crate) stats: PipelineStats,
}

impl SharedStatus {
    pub(crate) fn new(backend: BackendKind) -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Idle.to_u8()),
            backend: AtomicU8::new(backend.to_u8()),
            stats: PipelineStats::default(),
        }
    }

    pub(crate) fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Publish a new state; returns the previous one.
    pub(crate) fn set_state(&self, state: PipelineState) -> PipelineState {
        PipelineState::from_u8(self.state.swap(state.to_u8(), Ordering::SeqCst))
    }

    pub(crate) fn backend(&self) -> BackendKind {
        BackendKind::from_u8(self.backend.load(Ordering::SeqCst))
    }

    pub(crate) fn set_backend(&self, kind: BackendKind) {
        self.backend.store(kind.to_u8(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_atomic() {
        let status = SharedStatus::new(BackendKind::FastRectangular);
        assert_eq!(status.state(), PipelineState::Idle);
        for state in [
            PipelineState::Starting,
            PipelineState::Running,
            PipelineState::Stopping,
            PipelineState::Error,
            PipelineState::Idle,
        ] {
            status.set_state(state);
            assert_eq!(status.state(), state);
        }
        assert_eq!(status.backend(), BackendKind::FastRectangular);
        status.set_backend(BackendKind::GeneralPurpose);
        assert_eq!(status.backend(), BackendKind::GeneralPurpose);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let stats = PipelineStats::default();
        stats.record_open();
        stats.record_capture();
        stats.record_delivery(2);
        stats.record_delivery(0);
        stats.record_reset();
        stats.record_close();
        let snap = stats.snapshot();
        assert_eq!(snap.frames_captured, 1);
        assert_eq!(snap.frames_delivered, 2);
        assert_eq!(snap.symbols_reported, 2);
        assert_eq!(snap.dedup_resets, 1);
        assert_eq!((snap.device_opens, snap.device_closes), (1, 1));
        assert_eq!(snap.errors, 0);
    }
}
