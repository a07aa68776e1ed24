//! scannerd - live barcode/QR scanner.
//!
//! This daemon:
//! 1. Loads configuration (SCANNER_CONFIG file, SCANNER_* environment, flags)
//! 2. Opens the camera and scans on a worker thread
//! 3. Prints each newly seen symbol as `payload (KIND)` or a JSON line
//! 4. Stops on Ctrl-C, on a camera error or after `--frames` delivered frames,
//!    releasing the camera on the way out

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use symbol_scanner::config::ScannerConfig;
use symbol_scanner::{
    label_anchor, BackendKind, CameraProvider, DecodedSymbol, DecoderRegistry, Point, ScanEvent,
    Scanner, SyntheticCamera, SystemCameras,
};

const POLL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(author, version, about = "Scan barcodes and QR codes from a live camera")]
struct Args {
    /// TOML configuration file (overrides SCANNER_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera index.
    #[arg(long)]
    device: Option<u32>,

    /// Decoder backend (fast-rectangular or general-purpose).
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Loop period in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Keep frames in camera orientation.
    #[arg(long)]
    no_mirror: bool,

    /// Exit after this many delivered frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Emit JSON lines instead of text.
    #[arg(long)]
    json: bool,

    /// Use the synthetic camera showing this image instead of a real device.
    #[arg(long, value_name = "IMAGE")]
    synthetic: Option<PathBuf>,
}

#[derive(Serialize)]
struct SymbolLine<'a> {
    backend: &'static str,
    #[serde(flatten)]
    symbol: &'a DecodedSymbol,
    label: String,
    label_at: Point,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(path) = &args.config {
        std::env::set_var("SCANNER_CONFIG", path);
    }
    let config = ScannerConfig::load()?;
    let mut options = config.scan_options();
    if let Some(device) = args.device {
        options.device_index = device;
    }
    if let Some(backend) = args.backend {
        options.backend = Some(backend);
    }
    if let Some(ms) = args.interval_ms {
        if ms == 0 {
            return Err(anyhow!("--interval-ms must be greater than zero"));
        }
        options.interval = Duration::from_millis(ms);
    }
    if args.no_mirror {
        options.mirror = false;
    }

    let provider: Box<dyn CameraProvider> = match &args.synthetic {
        Some(path) => {
            let scene = image::open(path)
                .with_context(|| format!("load synthetic scene {}", path.display()))?
                .to_rgb8();
            let camera = SyntheticCamera::with_devices([options.device_index]);
            camera.set_scene(Some(scene));
            log::info!("using synthetic camera showing {}", path.display());
            Box::new(camera)
        }
        None => Box::new(SystemCameras),
    };

    let (scanner, events) = Scanner::spawn(provider, DecoderRegistry::with_builtin())?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    log::info!(
        "scanning camera {} at {}x{} every {} ms",
        options.device_index,
        options.width,
        options.height,
        options.interval.as_millis()
    );
    scanner.start(options)?;

    let mut delivered = 0u64;
    let mut failure = None;
    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(POLL) {
            Ok(ScanEvent::Frame(event)) => {
                delivered += 1;
                for symbol in &event.symbols {
                    if args.json {
                        let line = SymbolLine {
                            backend: event.backend.as_str(),
                            symbol,
                            label: symbol.label(),
                            label_at: label_anchor(symbol),
                        };
                        println!("{}", serde_json::to_string(&line)?);
                    } else {
                        println!("{}", symbol.label());
                    }
                }
                if args.frames.is_some_and(|limit| delivered >= limit) {
                    break;
                }
            }
            Ok(ScanEvent::Error(err)) => {
                log::error!("{}", err);
                failure = Some(err);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!("shutting down scanner...");
    scanner.stop()?;
    scanner.flush()?;
    let stats = scanner.stats();
    log::info!(
        "frames captured={} delivered={} symbols reported={} errors={}",
        stats.frames_captured,
        stats.frames_delivered,
        stats.symbols_reported,
        stats.errors
    );
    drop(scanner);

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
