pub mod sdl;

pub use sdl::Sdl2Display;
