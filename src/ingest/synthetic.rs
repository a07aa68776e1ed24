//! Synthetic camera for tests and demos.
//!
//! Every read renders the current scene centred on a flat grey background at the
//! resolution the handle was opened with. Handles share one set of counters, so a
//! test can hold a clone of the camera while the pipeline owns the handles and
//! still observe how many devices were opened and released.

use image::RgbImage;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CameraProvider, CaptureRequest, FrameSource};
use crate::error::ScanError;
use crate::frame::{Frame, BYTES_PER_PIXEL};

const BACKGROUND: u8 = 200;

struct SyntheticState {
    devices: BTreeSet<u32>,
    scene: Option<Arc<RgbImage>>,
    fail_after: Option<u64>,
}

struct SyntheticInner {
    state: Mutex<SyntheticState>,
    opens: AtomicU64,
    closes: AtomicU64,
    reads: AtomicU64,
    open_handles: AtomicUsize,
    max_open_handles: AtomicUsize,
}

/// Scripted stand-in for a camera. Device 0 exists unless configured otherwise.
#[derive(Clone)]
pub struct SyntheticCamera {
    inner: Arc<SyntheticInner>,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::with_devices([0])
    }

    pub fn with_devices(devices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner: Arc::new(SyntheticInner {
                state: Mutex::new(SyntheticState {
                    devices: devices.into_iter().collect(),
                    scene: None,
                    fail_after: None,
                }),
                opens: AtomicU64::new(0),
                closes: AtomicU64::new(0),
                reads: AtomicU64::new(0),
                open_handles: AtomicUsize::new(0),
                max_open_handles: AtomicUsize::new(0),
            }),
        }
    }

    /// Replace what the camera sees. `None` shows an empty background.
    pub fn set_scene(&self, scene: Option<RgbImage>) {
        self.state().scene = scene.map(Arc::new);
    }

    /// Make every handle fail with `ReadTimeout` once it has produced `frames` frames.
    pub fn fail_reads_after(&self, frames: u64) {
        self.state().fail_after = Some(frames);
    }

    pub fn opens(&self) -> u64 {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Successful reads across all handles.
    pub fn reads(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.inner.open_handles.load(Ordering::SeqCst)
    }

    /// Highest number of handles that were open at the same time.
    pub fn max_open_handles(&self) -> usize {
        self.inner.max_open_handles.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, SyntheticState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CameraProvider for SyntheticCamera {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn FrameSource>, ScanError> {
        if !self.state().devices.contains(&request.device_index) {
            return Err(ScanError::device_unavailable(
                request.device_index,
                "no such synthetic device",
            ));
        }
        if request.width == 0 || request.height == 0 {
            return Err(ScanError::device_unavailable(
                request.device_index,
                format!("unsupported resolution {}x{}", request.width, request.height),
            ));
        }
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let open = self.inner.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_open_handles.fetch_max(open, Ordering::SeqCst);
        log::debug!(
            "synthetic camera {}: handle opened ({} open)",
            request.device_index,
            open
        );
        Ok(Box::new(SyntheticSource {
            camera: self.clone(),
            request: request.clone(),
            frames: 0,
            closed: false,
        }))
    }
}

struct SyntheticSource {
    camera: SyntheticCamera,
    request: CaptureRequest,
    frames: u64,
    closed: bool,
}

impl SyntheticSource {
    fn render(&self, scene: Option<&RgbImage>) -> Vec<u8> {
        let width = self.request.width as usize;
        let height = self.request.height as usize;
        let mut pixels = vec![BACKGROUND; width * height * BYTES_PER_PIXEL];
        let Some(scene) = scene else {
            return pixels;
        };
        let (sw, sh) = (scene.width() as usize, scene.height() as usize);
        // Centre the scene; crop whatever does not fit.
        let ox = width.saturating_sub(sw) / 2;
        let oy = height.saturating_sub(sh) / 2;
        let sx0 = sw.saturating_sub(width) / 2;
        let sy0 = sh.saturating_sub(height) / 2;
        let cols = sw.min(width);
        let rows = sh.min(height);
        let raw = scene.as_raw();
        for row in 0..rows {
            let src = ((sy0 + row) * sw + sx0) * BYTES_PER_PIXEL;
            let dst = ((oy + row) * width + ox) * BYTES_PER_PIXEL;
            let len = cols * BYTES_PER_PIXEL;
            pixels[dst..dst + len].copy_from_slice(&raw[src..src + len]);
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Result<Frame, ScanError> {
        if self.closed {
            return Err(ScanError::device_unavailable(
                self.request.device_index,
                "handle closed",
            ));
        }
        let (scene, fail_after) = {
            let state = self.camera.state();
            (state.scene.clone(), state.fail_after)
        };
        if fail_after.is_some_and(|limit| self.frames >= limit) {
            return Err(ScanError::ReadTimeout {
                index: self.request.device_index,
                waited_ms: self.request.read_timeout.as_millis() as u64,
            });
        }
        let pixels = self.render(scene.as_deref());
        self.frames += 1;
        self.camera.inner.reads.fetch_add(1, Ordering::SeqCst);
        Frame::new(self.request.width, self.request.height, pixels)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.camera.inner.closes.fetch_add(1, Ordering::SeqCst);
        self.camera.inner.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.close();
    }
}
