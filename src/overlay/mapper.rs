//! Pure geometry and styling for detection overlays.
//!
//! Detection geometry arrives in reference-frame coordinates: x against a
//! fixed reference width, y against the height derived from that width and
//! the source aspect ratio. Mapping to the display surface scales x by
//! `display_w / reference_w` and y by `display_h / (reference_w * aspect)`.

/// A rectangle in display-surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl SurfaceRect {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Map reference-frame geometry onto a display surface. `aspect` is the
/// source frame's height/width ratio; the reference height is derived from
/// it, never scaled independently.
pub fn map_to_surface(
    xyxy: [f32; 4],
    reference_w: f32,
    display_w: f32,
    display_h: f32,
    aspect: f32,
) -> SurfaceRect {
    let sx = display_w / reference_w;
    let sy = display_h / (reference_w * aspect);
    SurfaceRect {
        x1: xyxy[0] * sx,
        y1: xyxy[1] * sy,
        x2: xyxy[2] * sx,
        y2: xyxy[3] * sy,
    }
}

/// The four detection classes the overlay distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionClass {
    /// Wearing a helmet
    Compliant,
    /// Explicitly not wearing one
    Violation,
    /// A bare head without a verdict
    Partial,
    /// Anything else the model emits
    Unknown,
}

/// Classify a label by case-insensitive substring, negation first: a label
/// carrying both "helmet" and "no" is always a violation.
pub fn classify(label: &str) -> DetectionClass {
    let label = label.to_ascii_lowercase();
    if label.contains("no") || label.contains("without") {
        DetectionClass::Violation
    } else if label.contains("helmet") {
        DetectionClass::Compliant
    } else if label.contains("head") {
        DetectionClass::Partial
    } else {
        DetectionClass::Unknown
    }
}

/// Stroke color and fill opacity for one detection class.
#[derive(Debug, Clone, Copy)]
pub struct ClassStyle {
    pub stroke: [u8; 3],
    pub fill_alpha: f32,
}

pub fn class_style(class: DetectionClass) -> ClassStyle {
    let stroke = match class {
        DetectionClass::Compliant => [0x22, 0xc5, 0x5e],
        DetectionClass::Violation => [0xef, 0x44, 0x44],
        DetectionClass::Partial => [0xf5, 0x9e, 0x0b],
        DetectionClass::Unknown => [0x3b, 0x82, 0xf6],
    };
    ClassStyle {
        stroke,
        fill_alpha: 0.2,
    }
}

/// Label chip text: the raw label plus rounded confidence percentage.
pub fn chip_text(label: &str, conf: f32) -> String {
    let label = if label.is_empty() { "Detection" } else { label };
    format!("{} {:.0}%", label, conf * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_reference_scenario() {
        // 1280x720 camera, reference width 640 => derived height 360,
        // rendered onto a 960x540 surface.
        let rect = map_to_surface([100.0, 50.0, 200.0, 150.0], 640.0, 960.0, 540.0, 720.0 / 1280.0);
        assert_eq!(
            rect,
            SurfaceRect {
                x1: 150.0,
                y1: 75.0,
                x2: 300.0,
                y2: 225.0
            }
        );
    }

    #[test]
    fn positive_scale_preserves_ordering() {
        for (dw, dh) in [(320.0, 180.0), (640.0, 360.0), (1920.0, 1080.0), (777.0, 333.0)] {
            let rect = map_to_surface([10.0, 20.0, 30.0, 40.0], 640.0, dw, dh, 0.5625);
            assert!(rect.x1 < rect.x2, "x ordering broken at {dw}x{dh}");
            assert!(rect.y1 < rect.y2, "y ordering broken at {dw}x{dh}");
        }
    }

    #[test]
    fn aspect_correct_surface_scales_uniformly() {
        // When the surface keeps the source aspect, x and y scale equally.
        let rect = map_to_surface([0.0, 0.0, 64.0, 64.0], 640.0, 960.0, 540.0, 540.0 / 960.0);
        assert!((rect.width() - rect.height()).abs() < 1e-3);
    }

    #[test]
    fn negation_takes_precedence_over_affirmative() {
        assert_eq!(classify("no_helmet"), DetectionClass::Violation);
        assert_eq!(classify("NO HELMET"), DetectionClass::Violation);
        assert_eq!(classify("person without helmet"), DetectionClass::Violation);
    }

    #[test]
    fn classification_is_total() {
        assert_eq!(classify("helmet"), DetectionClass::Compliant);
        assert_eq!(classify("Hardhat Helmet"), DetectionClass::Compliant);
        assert_eq!(classify("head"), DetectionClass::Partial);
        assert_eq!(classify("person"), DetectionClass::Unknown);
        assert_eq!(classify(""), DetectionClass::Unknown);
    }

    #[test]
    fn violation_class_is_red() {
        assert_eq!(class_style(DetectionClass::Violation).stroke, [0xef, 0x44, 0x44]);
    }

    #[test]
    fn chip_text_rounds_confidence() {
        assert_eq!(chip_text("no_helmet", 0.91), "no_helmet 91%");
        assert_eq!(chip_text("helmet", 0.999), "helmet 100%");
        assert_eq!(chip_text("", 0.5), "Detection 50%");
    }
}
