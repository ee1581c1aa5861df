//! SDL2 render loop.
//!
//! Runs on the main thread, paced by vsync. Every pass draws the latest
//! captured frame and composes the latest detection set over it; the loop
//! never waits on the network and a failed pass never stops the next one.

use std::time::Instant;

use color_eyre::{eyre::eyre, Result};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use tracing::{info, warn};

use crate::capture::{decoder, Frame};
use crate::overlay::{self, FontRenderer};
use crate::pipeline::session::Session;

pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    font: Option<FontRenderer>,
    reference_width: u32,
}

impl Sdl2Display {
    pub fn new(
        sdl_context: &sdl2::Sdl,
        width: u32,
        height: u32,
        reference_width: u32,
    ) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window("Vigil Safety Monitor", width, height)
            .position_centered()
            .build()?;

        // present_vsync ties the loop to the display refresh
        let canvas = window.into_canvas().present_vsync().build()?;
        let texture_creator = canvas.texture_creator();

        Ok(Self {
            canvas,
            texture_creator,
            font: FontRenderer::try_load(),
            reference_width,
        })
    }

    /// Decode the frame, compose the overlay, and present.
    fn render_frame(&mut self, frame: &Frame, session: &Session) -> Result<()> {
        let render_start = Instant::now();

        let decoded = decoder::decode_frame(
            &frame.data,
            frame.meta.format,
            frame.meta.width,
            frame.meta.height,
        )?;
        let mut img = image::RgbImage::from_raw(decoded.width, decoded.height, decoded.rgb)
            .ok_or_else(|| eyre!("decoded frame has inconsistent dimensions"))?;

        // Best-effort overlay: whatever result set arrived most recently.
        let detections = session.slot.snapshot();
        overlay::draw_detections(&mut img, &detections, self.reference_width, self.font.as_ref());

        let (w, h) = (img.width(), img.height());
        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, w, h)
            .map_err(|e| eyre!(e))?;
        texture
            .update(None, img.as_raw(), (w * 3) as usize)
            .map_err(|e| eyre!(e))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;
        self.canvas.present();

        metrics::histogram!("render_time_us").record(render_start.elapsed().as_micros() as f64);
        Ok(())
    }

    /// Run until quit. Passes with no frame available yet just re-present
    /// (vsync still paces the loop) instead of drawing undefined state.
    pub fn run(&mut self, sdl_context: &sdl2::Sdl, session: &Session) -> Result<()> {
        let mut event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;

        'running: loop {
            for event in event_pump.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => {
                        info!("Quit requested");
                        break 'running;
                    }
                    _ => {}
                }
            }

            match session.frames.latest() {
                Some(frame) => {
                    if let Err(e) = self.render_frame(&frame, session) {
                        // One bad frame must not stop the loop.
                        warn!("Render pass failed: {e}");
                        self.canvas.present();
                    }
                }
                None => self.canvas.present(),
            }
        }

        Ok(())
    }
}
