//! Raw frame payload to packed RGB24.

use jpeg_decoder::Decoder;

use crate::error::PipelineError;

use super::frame::PixelFormat;

/// A decoded frame: packed RGB24 plus the dimensions the decoder reported
/// (for MJPEG these come from the JPEG header, not the capture config).
#[derive(Debug)]
pub struct DecodedFrame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn decode_frame(
    data: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<DecodedFrame, PipelineError> {
    match format {
        PixelFormat::Mjpeg => {
            let mut decoder = Decoder::new(data);
            let rgb = decoder
                .decode()
                .map_err(|e| PipelineError::FrameDecode(e.to_string()))?;
            let info = decoder
                .info()
                .ok_or_else(|| PipelineError::FrameDecode("missing JPEG header".into()))?;
            Ok(DecodedFrame {
                rgb,
                width: info.width as u32,
                height: info.height as u32,
            })
        }
        PixelFormat::Rgb24 => Ok(DecodedFrame {
            rgb: data.to_vec(),
            width,
            height,
        }),
        PixelFormat::Yuyv4 => {
            let expected = (width * height * 2) as usize;
            if data.len() < expected {
                return Err(PipelineError::FrameDecode(format!(
                    "YUYV payload too short: {} < {}",
                    data.len(),
                    expected
                )));
            }
            Ok(DecodedFrame {
                rgb: yuyv_to_rgb(data, width, height),
                width,
                height,
            })
        }
    }
}

/// YUYV 4:2:2 to packed RGB24 (BT.601).
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..(width * height * 2) as usize].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        for y in [y0, y1] {
            let c = y as f32 - 16.0;
            let d = u as f32 - 128.0;
            let e = v as f32 - 128.0;
            rgb.push((1.164 * c + 1.596 * e).clamp(0.0, 255.0) as u8);
            rgb.push((1.164 * c - 0.392 * d - 0.813 * e).clamp(0.0, 255.0) as u8);
            rgb.push((1.164 * c + 2.017 * d).clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}
