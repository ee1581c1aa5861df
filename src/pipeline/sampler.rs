//! Periodic frame sampler.
//!
//! Every `send_interval_ms` the current frame (if any) is scaled to the
//! reference width, JPEG-encoded and handed to the channel. Ticks that
//! find the transport closed, no frame published yet, or a frame that
//! fails to encode are silent no-ops; nothing is buffered or retried.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::capture::{decoder, Frame};
use crate::detect::channel::ChannelHandle;
use crate::detect::{FramePayload, Supervisor};
use crate::error::PipelineError;
use crate::pipeline::slot::FrameCell;
use crate::DetectorConfig;

/// Run the sampling loop until the task is aborted at teardown.
pub async fn run(
    config: DetectorConfig,
    frames: Arc<FrameCell>,
    channel: ChannelHandle,
    supervisor: Arc<Supervisor>,
) {
    let mut tick = tokio::time::interval(Duration::from_millis(config.send_interval_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tick.tick().await;

        if !supervisor.transport_open() {
            continue;
        }
        let Some(frame) = frames.latest() else {
            continue;
        };

        let started = Instant::now();
        match encode_payload(&frame, config.reference_width, config.jpeg_quality) {
            Ok(payload) => {
                metrics::histogram!("sampler_encode_us")
                    .record(started.elapsed().as_micros() as f64);
                if !channel.send(payload) {
                    debug!("Transport busy, sampling tick dropped");
                }
            }
            // Per-tick failures must not stop subsequent ticks.
            Err(e) => warn!("Sampling tick skipped: {e}"),
        }
    }
}

/// Scale a frame to the reference width (height derived from the source
/// aspect ratio), encode as JPEG and wrap it in the outbound payload.
pub fn encode_payload(
    frame: &Frame,
    reference_width: u32,
    jpeg_quality: u8,
) -> Result<FramePayload, PipelineError> {
    let decoded = decoder::decode_frame(
        &frame.data,
        frame.meta.format,
        frame.meta.width,
        frame.meta.height,
    )?;

    let img = RgbImage::from_raw(decoded.width, decoded.height, decoded.rgb)
        .ok_or_else(|| PipelineError::FrameDecode("RGB buffer size mismatch".into()))?;

    let target_height = ((reference_width as f32 * decoded.height as f32
        / decoded.width as f32)
        .round() as u32)
        .max(1);
    let resized = imageops::resize(
        &img,
        reference_width,
        target_height,
        imageops::FilterType::Triangle,
    );

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut Cursor::new(&mut jpeg), jpeg_quality)
        .encode_image(&resized)
        .map_err(|e| PipelineError::FrameDecode(e.to_string()))?;

    Ok(FramePayload {
        image: format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use bytes::Bytes;

    fn rgb_frame(width: u32, height: u32) -> Frame {
        Frame {
            data: Bytes::from(vec![90u8; (width * height * 3) as usize]),
            meta: Arc::new(FrameMetadata {
                sequence: 1,
                width,
                height,
                format: PixelFormat::Rgb24,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn payload_is_a_jpeg_data_url() {
        let payload = encode_payload(&rgb_frame(64, 36), 640, 70).unwrap();
        assert!(payload.image.starts_with("data:image/jpeg;base64,"));

        let jpeg = BASE64
            .decode(payload.image.trim_start_matches("data:image/jpeg;base64,"))
            .unwrap();
        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn sampled_frame_has_reference_width_and_derived_height() {
        let payload = encode_payload(&rgb_frame(1280, 720), 640, 70).unwrap();
        let jpeg = BASE64
            .decode(payload.image.trim_start_matches("data:image/jpeg;base64,"))
            .unwrap();

        let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
        decoder.read_info().unwrap();
        let info = decoder.info().unwrap();
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 360); // 640 * (720 / 1280)
    }

    #[test]
    fn garbage_frame_is_a_per_tick_error() {
        let frame = Frame {
            data: Bytes::from_static(&[0, 1, 2]),
            meta: Arc::new(FrameMetadata {
                sequence: 1,
                width: 1280,
                height: 720,
                format: PixelFormat::Mjpeg,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        };
        assert!(encode_payload(&frame, 640, 70).is_err());
    }
}
