//! Pipeline driver.
//!
//! `Scanner` is the consumer-side handle. Control calls (`start`, `stop`,
//! `switch_backend`, `clear_seen`) are queued to a dedicated worker thread and
//! return as soon as the command is handed off; their outcome shows up on the
//! delivery channel and in `state()`. `decode_once` runs on the caller's thread
//! and never touches the session.

mod state;
mod worker;

pub use state::{PipelineState, PipelineStats, StatsSnapshot};

use crossbeam_channel::{bounded, unbounded, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::decode::{BackendKind, DecodedSymbol, DecoderRegistry};
use crate::delivery::{delivery_channel, DeliveryReceiver};
use crate::error::ScanError;
use crate::frame::Frame;
use crate::ingest::{CameraProvider, CaptureRequest};
use state::SharedStatus;
use worker::{Command, Worker};

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Options supplied with `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    /// Backend to activate for this session; `None` keeps the active one.
    pub backend: Option<BackendKind>,
    /// Loop period.
    pub interval: Duration,
    /// Longest a single device read may take before the session fails.
    pub read_timeout: Duration,
    /// Flip frames horizontally for display.
    pub mirror: bool,
    /// Outline decoded symbols on delivered frames.
    pub annotate: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            backend: None,
            interval: DEFAULT_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            mirror: true,
            annotate: true,
        }
    }
}

impl ScanOptions {
    pub fn new(device_index: u32, width: u32, height: u32) -> Self {
        Self {
            device_index,
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub(crate) fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            device_index: self.device_index,
            width: self.width,
            height: self.height,
            read_timeout: self.read_timeout,
        }
    }
}

/// Handle to a running scan worker.
///
/// Dropping the handle stops any session, releases the camera and joins the worker.
pub struct Scanner {
    commands: Sender<Command>,
    status: Arc<SharedStatus>,
    registry: DecoderRegistry,
    worker: Option<JoinHandle<()>>,
}

impl Scanner {
    /// Spawn the worker thread. The initial backend is the registry's default.
    pub fn spawn<P>(
        provider: P,
        registry: DecoderRegistry,
    ) -> Result<(Self, DeliveryReceiver), ScanError>
    where
        P: CameraProvider + 'static,
    {
        let backend = registry.default_kind().ok_or_else(|| {
            ScanError::WorkerUnavailable("decoder registry is empty".to_string())
        })?;
        let status = Arc::new(SharedStatus::new(backend));
        let (commands, command_rx) = unbounded();
        let (delivery, events) = delivery_channel();
        let worker = Worker::new(
            Box::new(provider),
            registry.clone(),
            backend,
            delivery,
            status.clone(),
        );
        let handle = thread::Builder::new()
            .name("scan-worker".to_string())
            .spawn(move || worker.run(command_rx))
            .map_err(|e| ScanError::WorkerUnavailable(format!("spawn scan worker: {}", e)))?;
        Ok((
            Self {
                commands,
                status,
                registry,
                worker: Some(handle),
            },
            events,
        ))
    }

    /// Open the camera and begin scanning. Ignored if a session is already running.
    pub fn start(&self, options: ScanOptions) -> Result<(), ScanError> {
        if let Some(kind) = options.backend {
            self.ensure_registered(kind)?;
        }
        self.send(Command::Start(options))
    }

    /// End the session and release the camera. No-op when idle.
    pub fn stop(&self) -> Result<(), ScanError> {
        self.send(Command::Stop)
    }

    /// Change the active backend. A running session is closed, its seen-set
    /// cleared and the camera reopened with the same options.
    pub fn switch_backend(&self, kind: BackendKind) -> Result<(), ScanError> {
        self.ensure_registered(kind)?;
        self.send(Command::SwitchBackend(kind))
    }

    /// Forget reported payloads without touching the camera.
    pub fn clear_seen(&self) -> Result<(), ScanError> {
        self.send(Command::ClearSeen)
    }

    /// Decode a caller-supplied frame with the active backend.
    pub fn decode_once(&self, frame: &Frame) -> Result<Vec<DecodedSymbol>, ScanError> {
        self.registry.decode_with(self.active_backend(), frame)
    }

    /// Block until the worker has handled every command sent before this call.
    pub fn flush(&self) -> Result<(), ScanError> {
        let (reply, done) = bounded(1);
        self.send(Command::Flush(reply))?;
        done.recv()
            .map_err(|_| ScanError::WorkerUnavailable("scan worker exited".to_string()))
    }

    pub fn state(&self) -> PipelineState {
        self.status.state()
    }

    pub fn active_backend(&self) -> BackendKind {
        self.status.backend()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.status.stats.snapshot()
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    fn ensure_registered(&self, kind: BackendKind) -> Result<(), ScanError> {
        match self.registry.get(kind) {
            Some(_) => Ok(()),
            None => Err(ScanError::BackendNotRegistered {
                backend: kind.as_str(),
            }),
        }
    }

    fn send(&self, command: Command) -> Result<(), ScanError> {
        self.commands
            .send(command)
            .map_err(|_| ScanError::WorkerUnavailable("scan worker exited".to_string()))
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("scan worker panicked");
            }
        }
    }
}
