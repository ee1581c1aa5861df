//! End-to-end checks of the receive→slot→overlay path, no hardware needed.

use image::{Rgb, RgbImage};
use vigil::detect::wire::{parse_inbound, InboundMessage};
use vigil::overlay;
use vigil::pipeline::ResultSlot;

fn apply(slot: &ResultSlot, text: &str) {
    match parse_inbound(text) {
        Ok(InboundMessage::Detections(set)) => slot.publish(set),
        Ok(InboundMessage::ServiceError(_)) | Err(_) => {}
    }
}

#[test]
fn latest_result_wins_across_the_wire() {
    let slot = ResultSlot::new();

    apply(
        &slot,
        r#"{"detections":[{"xyxy":[0,0,10,10],"label":"helmet","conf":0.5}]}"#,
    );
    apply(
        &slot,
        r#"{"detections":[{"xyxy":[5,5,20,20],"label":"no_helmet","conf":0.9}]}"#,
    );

    // A render tick after both messages sees exactly the second set.
    let seen = slot.snapshot();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].label, "no_helmet");
    assert_eq!(slot.frames_received(), 2);
}

#[test]
fn bad_messages_never_disturb_the_slot() {
    let slot = ResultSlot::new();

    apply(
        &slot,
        r#"{"detections":[{"xyxy":[0,0,10,10],"label":"helmet","conf":0.5}]}"#,
    );
    apply(&slot, "{garbage");
    apply(&slot, r#"{"error":"inference error: timeout"}"#);

    let seen = slot.snapshot();
    assert_eq!(seen[0].label, "helmet");
    assert_eq!(slot.frames_received(), 1);
}

#[test]
fn reference_scenario_renders_a_violation_box() {
    // 1280x720 camera sampled at reference width 640; detections drawn on
    // a 960x540 aspect-correct surface land at (150,75)-(300,225).
    let slot = ResultSlot::new();
    apply(
        &slot,
        r#"{"detections":[{"xyxy":[100,50,200,150],"label":"no_helmet","conf":0.91}]}"#,
    );

    let mut surface = RgbImage::from_pixel(960, 540, Rgb([0, 0, 0]));
    overlay::draw_detections(&mut surface, &slot.snapshot(), 640, None);

    let red = [0xef, 0x44, 0x44];
    assert_eq!(surface.get_pixel(150, 75).0, red);
    assert_eq!(surface.get_pixel(299, 224).0, red);
    assert_eq!(surface.get_pixel(500, 300).0, [0, 0, 0]);
}

#[test]
fn rendering_an_empty_slot_is_a_clean_no_op() {
    let slot = ResultSlot::new();
    let mut surface = RgbImage::from_pixel(320, 180, Rgb([42, 42, 42]));
    let before = surface.clone();
    overlay::draw_detections(&mut surface, &slot.snapshot(), 640, None);
    assert_eq!(surface, before);
}
