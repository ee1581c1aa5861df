use crate::capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};
use tracing::info;
use v4l::{capability::Flags, video::Capture, Device, FourCC};

use crate::error::PipelineError;

// Detected capture device info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub format: PixelFormat,
}

impl FoundDevice {
    pub fn new(path: String, format: PixelFormat) -> Self {
        Self { path, format }
    }
}

/// Auto-detect best capture device. MJPEG-capable devices are preferred
/// (cheapest path to the JPEG payload the detector wants), YUYV accepted.
pub async fn auto_detect_device() -> Result<FoundDevice, PipelineError> {
    use std::path::Path;

    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        if let Ok(dev) = Device::with_path(&path) {
            if let Ok(caps) = dev.query_caps() {
                // Check for capture capability
                if caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                    if let Ok(formats) = dev.enum_formats() {
                        for fmt in formats {
                            if fmt.fourcc == FourCC::new(b"MJPG") {
                                info!("Found MJPEG device: {} - {}", path, caps.card);
                                return Ok(FoundDevice {
                                    path,
                                    format: PixelFormat::Mjpeg,
                                });
                            } else if fmt.fourcc == FourCC::new(b"YUYV") {
                                info!("Found YUYV device: {} - {}", path, caps.card);
                                return Ok(FoundDevice {
                                    path,
                                    format: PixelFormat::Yuyv4,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    Err(PipelineError::DeviceAcquisition(
        "no suitable capture device found".into(),
    ))
}
