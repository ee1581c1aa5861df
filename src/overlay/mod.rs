pub mod draw;
pub mod font;
pub mod mapper;

pub use draw::draw_detections;
pub use font::FontRenderer;
pub use mapper::{class_style, classify, map_to_surface, ClassStyle, DetectionClass};
