//! Frame acquisition.
//!
//! This module provides the capture side of the pipeline:
//! - `CameraProvider`: opens a device by index at a requested resolution
//! - `FrameSource`: an open device handle producing RGB24 frames
//! - `Camera`: the handle the worker owns, applying the display mirror and
//!   guaranteeing a single close
//! - `SyntheticCamera`: scripted stand-in device (tests, `--synthetic`)
//! - `V4l2Camera`: local USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Sources MUST NOT block a read past their read timeout; a device that cannot
//! produce a frame in time reports `ScanError::ReadTimeout`.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use synthetic::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

use std::time::Duration;

use crate::error::ScanError;
use crate::frame::Frame;

/// Parameters for opening a capture device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    /// Longest a single `read` may wait for the device.
    pub read_timeout: Duration,
}

/// An open capture device.
pub trait FrameSource: Send {
    /// Next frame in device orientation (unmirrored).
    fn read(&mut self) -> Result<Frame, ScanError>;

    /// Release the device. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens capture devices by index.
pub trait CameraProvider: Send {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn FrameSource>, ScanError>;
}

impl<P: CameraProvider + ?Sized> CameraProvider for Box<P> {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn FrameSource>, ScanError> {
        (**self).open(request)
    }
}

/// Provider for the host's real cameras.
///
/// Without the `ingest-v4l2` feature there is no device backend and every open
/// reports `DeviceUnavailable`.
#[derive(Clone, Debug, Default)]
pub struct SystemCameras;

impl CameraProvider for SystemCameras {
    #[cfg(feature = "ingest-v4l2")]
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn FrameSource>, ScanError> {
        let camera = V4l2Camera::open(request)?;
        Ok(Box::new(camera))
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn FrameSource>, ScanError> {
        Err(ScanError::device_unavailable(
            request.device_index,
            "built without camera support (enable feature ingest-v4l2)",
        ))
    }
}

/// Device handle owned by the pipeline worker.
///
/// Frames come out horizontally flipped when `mirror` is set, so all downstream
/// geometry is in display orientation. The device is closed exactly once, either
/// by `close` or on drop.
pub struct Camera {
    source: Box<dyn FrameSource>,
    device_index: u32,
    mirror: bool,
    open: bool,
}

impl Camera {
    pub fn open(
        provider: &dyn CameraProvider,
        request: &CaptureRequest,
        mirror: bool,
    ) -> Result<Self, ScanError> {
        let source = provider.open(request)?;
        log::info!(
            "camera {}: opened at {}x{} (mirror={})",
            request.device_index,
            request.width,
            request.height,
            mirror
        );
        Ok(Self {
            source,
            device_index: request.device_index,
            mirror,
            open: true,
        })
    }

    pub fn read(&mut self) -> Result<Frame, ScanError> {
        if !self.open {
            return Err(ScanError::device_unavailable(
                self.device_index,
                "device already closed",
            ));
        }
        let frame = self.source.read()?;
        Ok(if self.mirror { frame.mirrored() } else { frame })
    }

    /// Release the device. Returns `true` only for the call that actually closed it.
    pub fn close(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.source.close();
        self.open = false;
        log::info!("camera {}: closed", self.device_index);
        true
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn request(index: u32) -> CaptureRequest {
        CaptureRequest {
            device_index: index,
            width: 8,
            height: 4,
            read_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn close_is_idempotent_and_runs_on_drop() {
        let synthetic = SyntheticCamera::new();
        let mut camera = Camera::open(&synthetic, &request(0), false).unwrap();
        assert!(camera.close());
        assert!(!camera.close());
        drop(camera);
        assert_eq!(synthetic.closes(), 1);

        let camera = Camera::open(&synthetic, &request(0), false).unwrap();
        drop(camera);
        assert_eq!(synthetic.closes(), 2);
        assert_eq!(synthetic.open_handles(), 0);
    }

    #[test]
    fn read_after_close_fails() {
        let synthetic = SyntheticCamera::new();
        let mut camera = Camera::open(&synthetic, &request(0), false).unwrap();
        camera.close();
        assert!(matches!(
            camera.read(),
            Err(ScanError::DeviceUnavailable { index: 0, .. })
        ));
    }

    #[test]
    fn mirror_flips_frames() {
        let synthetic = SyntheticCamera::new();
        let mut scene = RgbImage::from_pixel(8, 4, Rgb([255, 255, 255]));
        scene.put_pixel(0, 0, Rgb([0, 0, 0]));
        synthetic.set_scene(Some(scene));

        let mut plain = Camera::open(&synthetic, &request(0), false).unwrap();
        let mut mirrored = Camera::open(&synthetic, &request(0), true).unwrap();
        let a = plain.read().unwrap();
        let b = mirrored.read().unwrap();
        assert_eq!(&a.pixels()[0..3], &[0, 0, 0]);
        assert_eq!(&b.pixels()[7 * 3..8 * 3], &[0, 0, 0]);
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn system_cameras_unavailable_without_feature() {
        let err = SystemCameras.open(&request(2)).err().unwrap();
        assert_eq!(err.kind(), "device_unavailable");
    }
}
