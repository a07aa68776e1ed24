use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::decode::BackendKind;
use crate::pipeline::{
    ScanOptions, DEFAULT_HEIGHT, DEFAULT_INTERVAL, DEFAULT_READ_TIMEOUT, DEFAULT_WIDTH,
};

const DEFAULT_DEVICE_INDEX: u32 = 0;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScannerConfigFile {
    camera: Option<CameraConfigFile>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device_index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    mirror: Option<bool>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    backend: Option<BackendKind>,
    interval_ms: Option<u64>,
    annotate: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub camera: CameraSettings,
    pub backend: BackendKind,
    pub interval: Duration,
    pub annotate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
    pub read_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        // Defaults only; cannot fail.
        Self::from_file(ScannerConfigFile::default())
    }
}

impl ScannerConfig {
    /// Defaults, then the file named by `SCANNER_CONFIG`, then `SCANNER_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCANNER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScannerConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        Self {
            camera: CameraSettings {
                device_index: camera.device_index.unwrap_or(DEFAULT_DEVICE_INDEX),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
                mirror: camera.mirror.unwrap_or(true),
                read_timeout: camera
                    .read_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_READ_TIMEOUT),
            },
            backend: pipeline.backend.unwrap_or_default(),
            interval: pipeline
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_INTERVAL),
            annotate: pipeline.annotate.unwrap_or(true),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(index) = env_parse::<u32>("SCANNER_DEVICE_INDEX", "a camera index")? {
            self.camera.device_index = index;
        }
        if let Some(width) = env_parse::<u32>("SCANNER_WIDTH", "a pixel count")? {
            self.camera.width = width;
        }
        if let Some(height) = env_parse::<u32>("SCANNER_HEIGHT", "a pixel count")? {
            self.camera.height = height;
        }
        if let Ok(backend) = std::env::var("SCANNER_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend
                    .parse()
                    .map_err(|e| anyhow!("SCANNER_BACKEND: {}", e))?;
            }
        }
        let interval = env_parse::<u64>("SCANNER_INTERVAL_MS", "a number of milliseconds")?;
        if let Some(ms) = interval {
            self.interval = Duration::from_millis(ms);
        }
        if let Ok(mirror) = std::env::var("SCANNER_MIRROR") {
            if !mirror.trim().is_empty() {
                self.camera.mirror = parse_bool(&mirror)
                    .ok_or_else(|| anyhow!("SCANNER_MIRROR must be true/false, got '{}'", mirror))?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("pipeline interval must be greater than zero"));
        }
        if self.camera.read_timeout < self.interval {
            return Err(anyhow!(
                "read timeout ({} ms) must be at least the frame interval ({} ms)",
                self.camera.read_timeout.as_millis(),
                self.interval.as_millis()
            ));
        }
        Ok(())
    }

    /// Start options for a session with this configuration.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            device_index: self.camera.device_index,
            width: self.camera.width,
            height: self.camera.height,
            backend: Some(self.backend),
            interval: self.interval,
            read_timeout: self.camera.read_timeout,
            mirror: self.camera.mirror,
            annotate: self.annotate,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ScannerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_parse<T: std::str::FromStr>(key: &str, what: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}, got '{}'", key, what, value)),
        _ => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
