//! Capture/decode loop.
//!
//! The worker thread owns the camera handle, the deduplicator and the active
//! backend choice. Everything else reaches it through `Command`s, so no other
//! thread ever touches the device or the seen-set.

use crossbeam_channel::{never, select, tick, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

use super::state::{PipelineState, SharedStatus};
use super::ScanOptions;
use crate::annotate::annotate;
use crate::decode::{BackendKind, DecoderRegistry};
use crate::dedup::Deduplicator;
use crate::delivery::{DeliverySender, FrameEvent};
use crate::error::ScanError;
use crate::ingest::{Camera, CameraProvider};

pub(crate) enum Command {
    Start(ScanOptions),
    Stop,
    SwitchBackend(BackendKind),
    ClearSeen,
    /// Replied to once every earlier command has been handled.
    Flush(Sender<()>),
    Shutdown,
}

struct Session {
    camera: Camera,
    options: ScanOptions,
    ticker: Receiver<Instant>,
}

pub(crate) struct Worker {
    provider: Box<dyn CameraProvider>,
    registry: DecoderRegistry,
    dedup: Deduplicator,
    delivery: DeliverySender,
    status: Arc<SharedStatus>,
    backend: BackendKind,
    session: Option<Session>,
}

impl Worker {
    pub(crate) fn new(
        provider: Box<dyn CameraProvider>,
        registry: DecoderRegistry,
        backend: BackendKind,
        delivery: DeliverySender,
        status: Arc<SharedStatus>,
    ) -> Self {
        Self {
            provider,
            registry,
            dedup: Deduplicator::new(),
            delivery,
            status,
            backend,
            session: None,
        }
    }

    pub(crate) fn run(mut self, commands: Receiver<Command>) {
        log::debug!("scan worker started (backend {})", self.backend);
        loop {
            let ticker = self
                .session
                .as_ref()
                .map(|session| session.ticker.clone())
                .unwrap_or_else(never);
            select! {
                recv(commands) -> msg => match msg {
                    Ok(command) => {
                        if !self.handle(command) {
                            break;
                        }
                    }
                    // Every handle is gone; nobody can stop us later.
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.tick(),
            }
        }
        self.close_session();
        self.status.set_state(PipelineState::Idle);
        log::debug!("scan worker exiting");
    }

    /// Returns `false` when the worker should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start(options) => self.start(options),
            Command::Stop => self.stop(),
            Command::SwitchBackend(kind) => self.switch_backend(kind),
            Command::ClearSeen => {
                self.dedup.reset();
                self.status.stats.record_reset();
                log::info!("seen payloads cleared");
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn start(&mut self, options: ScanOptions) {
        if let Some(session) = &self.session {
            log::warn!(
                "start ignored: already running on camera {}",
                session.camera.device_index()
            );
            return;
        }
        self.transition(PipelineState::Starting);
        if let Some(kind) = options.backend {
            self.set_backend(kind);
        }
        self.dedup.reset();
        self.status.stats.record_reset();
        match self.open_session(options) {
            Ok(()) => {
                self.transition(PipelineState::Running);
                // First frame right away rather than one interval later.
                self.tick();
            }
            Err(err) => self.fail(err),
        }
    }

    fn stop(&mut self) {
        if self.session.is_none() {
            log::debug!("stop ignored: not running");
            return;
        }
        self.transition(PipelineState::Stopping);
        self.close_session();
        self.transition(PipelineState::Idle);
    }

    fn switch_backend(&mut self, kind: BackendKind) {
        if self.registry.get(kind).is_none() {
            log::warn!("switch ignored: backend {} not registered", kind);
            return;
        }
        let Some(options) = self.session.as_ref().map(|s| s.options.clone()) else {
            self.set_backend(kind);
            return;
        };
        self.transition(PipelineState::Stopping);
        self.close_session();
        self.set_backend(kind);
        self.dedup.reset();
        self.status.stats.record_reset();
        self.transition(PipelineState::Starting);
        match self.open_session(options) {
            Ok(()) => self.transition(PipelineState::Running),
            Err(err) => self.fail(err),
        }
    }

    fn tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let annotate_frames = session.options.annotate;
        let frame = match session.camera.read() {
            Ok(frame) => frame,
            Err(err) => return self.fail(err),
        };
        self.status.stats.record_capture();

        let in_view = match self.registry.decode_with(self.backend, &frame) {
            Ok(symbols) => symbols,
            Err(err) => return self.fail(err),
        };
        let symbols = self.dedup.filter(in_view.clone());
        log::debug!(
            "frame {}x{} ({} bytes): {} in view, {} new",
            frame.width(),
            frame.height(),
            frame.byte_len(),
            in_view.len(),
            symbols.len()
        );
        for symbol in &symbols {
            log::info!("decoded {}", symbol.label());
        }

        let frame = if annotate_frames {
            match annotate(frame, &in_view) {
                Ok(frame) => frame,
                Err(err) => return self.fail(err),
            }
        } else {
            frame
        };
        let new_symbols = symbols.len();
        self.delivery.send_frame(FrameEvent {
            frame,
            symbols,
            in_view,
            backend: self.backend,
        });
        self.status.stats.record_delivery(new_symbols);
    }

    fn open_session(&mut self, options: ScanOptions) -> Result<(), ScanError> {
        let camera = Camera::open(
            self.provider.as_ref(),
            &options.capture_request(),
            options.mirror,
        )?;
        self.status.stats.record_open();
        let ticker = tick(options.interval);
        self.session = Some(Session {
            camera,
            options,
            ticker,
        });
        Ok(())
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if session.camera.close() {
                self.status.stats.record_close();
            }
        }
    }

    /// Surface an error and fall back to `Idle` with the device released.
    fn fail(&mut self, err: ScanError) {
        log::error!("scan session failed: {}", err);
        self.transition(PipelineState::Error);
        self.close_session();
        self.transition(PipelineState::Idle);
        self.status.stats.record_error();
        self.delivery.send_error(err);
    }

    fn set_backend(&mut self, kind: BackendKind) {
        if kind != self.backend {
            log::info!("backend {} -> {}", self.backend, kind);
        }
        self.backend = kind;
        self.status.set_backend(kind);
    }

    fn transition(&self, to: PipelineState) {
        let from = self.status.set_state(to);
        if from != to {
            log::info!("pipeline {} -> {}", from, to);
        }
    }
}
