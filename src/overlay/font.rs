//! Label chip text rendering.
//!
//! Loads the first usable system sans font; when none is found the overlay
//! degrades to chips without text rather than failing the render loop.

use std::fs;
use std::path::Path;

use image::RgbImage;
use rusttype::{point, Font, Scale};
use tracing::{debug, info};

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

pub struct FontRenderer {
    font: Font<'static>,
}

impl FontRenderer {
    pub fn try_load() -> Option<Self> {
        for path in FONT_CANDIDATES {
            if !Path::new(path).exists() {
                continue;
            }
            if let Ok(data) = fs::read(path) {
                if let Some(font) = Font::try_from_vec(data) {
                    info!("Loaded overlay font from {path}");
                    return Some(Self { font });
                }
            }
        }
        debug!("No usable system font found, label chips will be drawn without text");
        None
    }

    /// Advance width of `text` at `size_pt`, in pixels.
    pub fn measure_width(&self, text: &str, size_pt: f32) -> f32 {
        let scale = Scale::uniform(size_pt);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .map(|g| g.unpositioned().h_metrics().advance_width)
            .sum()
    }

    /// Rasterize `text` into the image at (x, y) being the text baseline
    /// origin's top-left. Glyph coverage below a threshold is skipped so
    /// chips stay crisp at small sizes.
    pub fn draw(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, color: [u8; 3], size_pt: f32) {
        let scale = Scale::uniform(size_pt);
        let v_metrics = self.font.v_metrics(scale);
        let origin = point(x as f32, y as f32 + v_metrics.ascent);
        let (w, h) = (img.width() as i32, img.height() as i32);

        for glyph in self.font.layout(text, scale, origin) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    if v < 0.2 {
                        return;
                    }
                    let px = bb.min.x + gx as i32;
                    let py = bb.min.y + gy as i32;
                    if px >= 0 && px < w && py >= 0 && py < h {
                        let dst = img.get_pixel_mut(px as u32, py as u32);
                        for (d, &c) in dst.0.iter_mut().zip(color.iter()) {
                            *d = (*d as f32 * (1.0 - v) + c as f32 * v) as u8;
                        }
                    }
                });
            }
        }
    }
}
