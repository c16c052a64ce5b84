//! V4L2-backed frame source with memory-mapped capture buffers.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{error, info};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::frame::{Frame, FrameMetadata, PixelFormat};
use crate::capture::source::FrameSource;
use crate::error::StreamError;
use crate::CaptureConfig;

/// Capture source wrapping a real V4L2 device.
///
/// A failed read is terminal: a disconnected or faulted camera does not
/// recover within the lifetime of the stream.
pub struct DeviceSource {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    config: CaptureConfig,
    sequence: u64,
}

impl DeviceSource {
    /// Open and configure the device, then start streaming.
    pub fn new(config: CaptureConfig) -> Result<Self, StreamError> {
        info!("Opening V4L2 device: {}", config.device);

        let open = |source: std::io::Error| StreamError::SourceOpen {
            path: config.device.clone(),
            source,
        };

        let device = Device::with_path(&config.device).map_err(open)?;

        let caps = device.query_caps().map_err(open)?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(open(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "device doesn't support video capture",
            )));
        }

        let mut fmt = device.format().map_err(open)?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = match config.format {
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
            PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        };
        device.set_format(&fmt).map_err(open)?;

        let mut source = Self {
            device: Box::new(device),
            stream: None,
            config,
            sequence: 0,
        };

        let stream =
            MmapStream::with_buffers(&source.device, Type::VideoCapture, source.config.buffer_count)
                .map_err(|e| StreamError::SourceOpen {
                    path: source.config.device.clone(),
                    source: e,
                })?;
        source.stream = Some(stream);

        info!(
            "Capture stream started with {} buffers",
            source.config.buffer_count
        );
        Ok(source)
    }
}

impl FrameSource for DeviceSource {
    fn read(&mut self) -> Option<Frame> {
        let timestamp = Instant::now();

        // Released (or never started) streams produce nothing
        let stream = self.stream.as_mut()?;

        let (buf, _meta) = match stream.next() {
            Ok(captured) => captured,
            Err(e) => {
                error!("Capture failed on {}: {}", self.config.device, e);
                return None;
            }
        };

        // The mmap'd buffer is requeued on the next dequeue, so the frame
        // owns its own copy of the pixels
        let data = Bytes::copy_from_slice(buf);

        self.sequence += 1;

        Some(Frame {
            data,
            meta: Arc::new(FrameMetadata {
                sequence: self.sequence,
                width: self.config.width,
                height: self.config.height,
                stride: self.config.width,
                format: self.config.format,
            }),
            timestamp,
        })
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            info!("Released V4L2 device: {}", self.config.device);
        }
    }
}
