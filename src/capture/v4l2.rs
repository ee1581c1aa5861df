//! V4L2 capture session: acquires the device, owns the mmap stream, and
//! releases both on teardown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, instrument};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::error::PipelineError;
use crate::{
    capture::frame::{Frame, FrameMetadata, PixelFormat},
    CaptureConfig,
};

/// One camera acquisition, scoped to a session. Dropping the session
/// releases the stream buffers and the device handle.
pub struct CaptureSession {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    config: CaptureConfig,
    sequence: u64,
}

impl CaptureSession {
    /// Acquire the device and negotiate the requested format. The
    /// configured width/height is a hint; the driver may adjust it.
    pub fn new(config: CaptureConfig) -> Result<Self, PipelineError> {
        info!("Acquiring capture device: {:?}", config.device);

        let device = Device::with_path(&config.device.path)
            .map_err(|e| PipelineError::DeviceAcquisition(e.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|e| PipelineError::DeviceAcquisition(e.to_string()))?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(PipelineError::DeviceAcquisition(
                "device doesn't support video capture".into(),
            ));
        }

        let mut fmt = device
            .format()
            .map_err(|e| PipelineError::DeviceAcquisition(e.to_string()))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = match config.format {
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
            PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        };

        device
            .set_format(&fmt)
            .map_err(|e| PipelineError::DeviceAcquisition(e.to_string()))?;

        Ok(Self {
            device: Box::new(device),
            stream: None,
            config,
            sequence: 0,
        })
    }

    /// Start streaming with memory-mapped buffers
    pub fn start_stream(&mut self) -> Result<(), PipelineError> {
        let stream =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.config.buffer_count)
                .map_err(|e| PipelineError::DeviceAcquisition(e.to_string()))?;

        self.stream = Some(stream);
        info!(
            "Capture stream started with {} buffers",
            self.config.buffer_count
        );
        Ok(())
    }

    /// Dequeue the next frame, blocking in the driver until one is ready.
    /// Per-frame errors are not fatal; the capture loop logs them and
    /// keeps polling.
    #[instrument(skip(self))]
    pub fn capture_frame(&mut self) -> Result<Frame> {
        let timestamp = Instant::now();

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| eyre!("Stream not started"))?;

        let (buf, meta) = stream.next()?;

        let data = Bytes::copy_from_slice(buf);

        self.sequence += 1;

        let frame_meta = Arc::new(FrameMetadata {
            sequence: self.sequence,
            width: self.config.width,
            height: self.config.height,
            format: self.config.format,
            device_timestamp: Some(
                Duration::from_secs(meta.timestamp.sec as u64)
                    + Duration::from_micros(meta.timestamp.usec as u64),
            ),
        });

        Ok(Frame {
            data,
            meta: frame_meta,
            timestamp,
        })
    }

}
