//! scan_image - decode barcodes and QR codes in a still image.
//!
//! Loads a PNG or JPEG, runs one decode with the chosen backend and prints one
//! `payload (KIND)` line per symbol found.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use symbol_scanner::{BackendKind, DecoderRegistry, Frame};

#[derive(Parser, Debug)]
#[command(author, version, about = "Decode barcodes and QR codes in an image file")]
struct Args {
    /// Image to scan (PNG or JPEG).
    image: PathBuf,

    /// Decoder backend (fast-rectangular or general-purpose).
    #[arg(long, env = "SCANNER_BACKEND", default_value = "general-purpose")]
    backend: BackendKind,

    /// Emit the symbols as a JSON array instead of text lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let image = match image::open(&args.image) {
        Ok(image) => image.to_rgb8(),
        Err(err) => {
            log::error!("failed to load {}: {}", args.image.display(), err);
            println!("Error: Cannot load image.");
            return Err(anyhow!("cannot load image {}", args.image.display()));
        }
    };
    let frame = Frame::from_rgb_image(image)?;
    let registry = DecoderRegistry::with_builtin();
    let symbols = registry.decode_with(args.backend, &frame)?;
    log::info!(
        "{}: {} symbol(s) with {}",
        args.image.display(),
        symbols.len(),
        args.backend
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&symbols)?);
    } else if symbols.is_empty() {
        println!("No barcode found in the image.");
    } else {
        println!("Image scan results:");
        for symbol in &symbols {
            println!("{}", symbol.label());
        }
    }
    Ok(())
}
