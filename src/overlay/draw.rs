//! Composes detection overlays onto a decoded frame.
//!
//! For each detection: a translucent class-colored fill, a solid 3px
//! border, and a label chip just above the top-left corner. Geometry is
//! mapped from reference-frame coordinates to the image being drawn on.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::overlay::font::FontRenderer;
use crate::overlay::mapper::{self, SurfaceRect};

const BORDER_PX: i32 = 3;
const CHIP_HEIGHT: i32 = 24;
const CHIP_PAD_X: i32 = 6;
const TEXT_SIZE_PT: f32 = 14.0;

/// Draw every detection of one result set onto the image. An empty set is
/// a no-op; out-of-bounds geometry is clipped, never an error.
pub fn draw_detections(
    img: &mut RgbImage,
    detections: &[Detection],
    reference_width: u32,
    font: Option<&FontRenderer>,
) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let aspect = h / w;

    for det in detections {
        let style = mapper::class_style(mapper::classify(&det.label));
        let rect = mapper::map_to_surface(det.xyxy, reference_width as f32, w, h, aspect);

        blend_fill(img, &rect, style.stroke, style.fill_alpha);
        stroke_rect(img, &rect, style.stroke);
        draw_chip(img, &rect, &det.label, det.conf, style.stroke, font);
    }
}

/// Alpha-blend a filled rectangle over the image (imageproc's filled rect
/// is opaque, so the blend is done per pixel here).
fn blend_fill(img: &mut RgbImage, rect: &SurfaceRect, color: [u8; 3], alpha: f32) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let x1 = (rect.x1 as i32).clamp(0, w);
    let y1 = (rect.y1 as i32).clamp(0, h);
    let x2 = (rect.x2 as i32).clamp(0, w);
    let y2 = (rect.y2 as i32).clamp(0, h);

    for y in y1..y2 {
        for x in x1..x2 {
            let px = img.get_pixel_mut(x as u32, y as u32);
            for (d, &c) in px.0.iter_mut().zip(color.iter()) {
                *d = (*d as f32 * (1.0 - alpha) + c as f32 * alpha) as u8;
            }
        }
    }
}

fn stroke_rect(img: &mut RgbImage, rect: &SurfaceRect, color: [u8; 3]) {
    for i in 0..BORDER_PX {
        let x = rect.x1 as i32 + i;
        let y = rect.y1 as i32 + i;
        let rw = rect.width() as i32 - 2 * i;
        let rh = rect.height() as i32 - 2 * i;
        if rw <= 0 || rh <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            img,
            Rect::at(x, y).of_size(rw as u32, rh as u32),
            Rgb(color),
        );
    }
}

fn draw_chip(
    img: &mut RgbImage,
    rect: &SurfaceRect,
    label: &str,
    conf: f32,
    color: [u8; 3],
    font: Option<&FontRenderer>,
) {
    let text = mapper::chip_text(label, conf);
    let text_width = font
        .map(|f| f.measure_width(&text, TEXT_SIZE_PT).ceil() as i32)
        .unwrap_or(text.len() as i32 * 8);

    let x = rect.x1 as i32;
    // Chip sits just above the box, clamped into the surface.
    let y = (rect.y1 as i32 - CHIP_HEIGHT).max(0);
    let chip_w = (text_width + 2 * CHIP_PAD_X) as u32;

    draw_filled_rect_mut(
        img,
        Rect::at(x, y).of_size(chip_w, CHIP_HEIGHT as u32),
        Rgb(color),
    );

    if let Some(font) = font {
        font.draw(img, x + CHIP_PAD_X, y + 3, &text, [0xff, 0xff, 0xff], TEXT_SIZE_PT);
    }
}
