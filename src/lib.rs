pub mod capture;
pub mod detect;
pub mod display;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod utils;

use arc_swap::ArcSwap;
use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::utils::FoundDevice;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub detector: DetectorConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: FoundDevice,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
}

/// Detection service endpoint and sampling policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// WebSocket endpoint of the detection service
    pub endpoint: String,
    /// Wall-clock period between sampled frames, milliseconds
    pub send_interval_ms: u64,
    /// Fixed width sampled frames are scaled to before encoding;
    /// all detection geometry comes back in this coordinate space
    pub reference_width: u32,
    /// JPEG quality for sampled frames, 0-100
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Config {
    /// Load configuration from an optional `vigil.toml` plus `VIGIL_*`
    /// environment overrides, falling back to defaults for anything unset.
    pub fn load() -> color_eyre::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("vigil").required(false))
            .add_source(config::Environment::with_prefix("VIGIL").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: FoundDevice::new(String::new(), PixelFormat::Mjpeg),
            width: 1280,
            height: 720,
            fps: 30,
            format: PixelFormat::Mjpeg,
            buffer_count: 4,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000/ws/detect".into(),
            send_interval_ms: 150,
            reference_width: 640,
            jpeg_quality: 70,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}
