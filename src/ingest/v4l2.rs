//! V4L2 camera.
//!
//! This module provides `V4l2Camera` for capturing from local device nodes
//! (`/dev/video<N>`). RGB24 is requested; devices that refuse it may answer
//! with BGR24 or YUYV, which are normalised to RGB24 here. Reads are bounded
//! by the request's read timeout through the stream's poll timeout.

use ouroboros::self_referencing;
use std::io;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CaptureRequest, FrameSource};
use crate::error::ScanError;
use crate::frame::Frame;

const STREAM_BUFFERS: u32 = 4;

#[self_referencing]
struct V4l2Stream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Open V4L2 capture device.
pub struct V4l2Camera {
    request: CaptureRequest,
    path: String,
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    stream: Option<V4l2Stream>,
    frames: u64,
}

impl V4l2Camera {
    pub fn open(request: &CaptureRequest) -> Result<Self, ScanError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let index = request.device_index;
        let path = format!("/dev/video{}", index);
        let unavailable = |what: &str, err: io::Error| {
            ScanError::device_unavailable(index, format!("{} {}: {}", what, path, err))
        };

        let mut device = v4l::Device::with_path(&path).map_err(|e| unavailable("open", e))?;
        let mut format = device.format().map_err(|e| unavailable("read format of", e))?;
        format.width = request.width;
        format.height = request.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .map_err(|e| unavailable("read format after set failure on", e))?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            ScanError::device_unavailable(
                index,
                format!("{} offers unsupported pixel format {}", path, format.fourcc),
            )
        })?;
        if format.width != request.width || format.height != request.height {
            log::warn!(
                "V4l2Camera: {} negotiated {}x{} instead of {}x{}",
                path,
                format.width,
                format.height,
                request.width,
                request.height
            );
        }

        let timeout = request.read_timeout;
        let stream = V4l2StreamTryBuilder {
            device,
            stream_builder: |device| {
                let mut stream = v4l::prelude::MmapStream::with_buffers(
                    device,
                    Type::VideoCapture,
                    STREAM_BUFFERS,
                )?;
                stream.set_timeout(timeout);
                Ok(stream)
            },
        }
        .try_build()
        .map_err(|e: io::Error| unavailable("create buffer stream for", e))?;

        log::info!(
            "V4l2Camera: connected to {} ({}x{} {:?}, {} bytes/line)",
            path,
            format.width,
            format.height,
            pixel_format,
            format.stride
        );
        Ok(Self {
            request: request.clone(),
            path,
            format: pixel_format,
            width: format.width,
            height: format.height,
            stride: format.stride,
            stream: Some(stream),
            frames: 0,
        })
    }
}

impl FrameSource for V4l2Camera {
    fn read(&mut self) -> Result<Frame, ScanError> {
        use v4l::io::traits::CaptureStream;

        let index = self.request.device_index;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ScanError::device_unavailable(index, "device not open"))?;
        let (width, height, stride, format) = (self.width, self.height, self.stride, self.format);
        let rgb = stream.with_mut(|fields| match fields.stream.next() {
            Ok((buf, _meta)) => normalize_to_rgb(buf, width, height, stride, format)
                .map_err(|e| ScanError::InvalidFrame(format!("{:#}", e))),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Err(ScanError::ReadTimeout {
                index,
                waited_ms: self.request.read_timeout.as_millis() as u64,
            }),
            Err(err) => Err(ScanError::device_unavailable(
                index,
                format!("capture from {} failed: {}", self.path, err),
            )),
        })?;
        self.frames += 1;
        Frame::new(width, height, rgb)
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::info!(
                "V4l2Camera: released {} after {} frame(s)",
                self.path,
                self.frames
            );
        }
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.close();
    }
}
