//! Wire protocol spoken with the detection service.
//!
//! Outbound: `{"image": "<base64 data-URL of a JPEG>"}`.
//! Inbound: either `{"error": "..."}` or
//! `{"detections": [{"xyxy": [x1,y1,x2,y2], "label": "...", "conf": c}]}`.
//! Geometry is expressed against the reference width the sampled frame was
//! scaled to, never against the display surface.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One sampled frame on its way to the detector. Transient: built by the
/// sampler, serialized by the channel, discarded after send.
#[derive(Debug, Clone, Serialize)]
pub struct FramePayload {
    pub image: String,
}

/// A single detection in reference-frame coordinates. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub xyxy: [f32; 4],
    #[serde(default)]
    pub label: String,
    pub conf: f32,
}

/// The ordered detections of one result message.
pub type DetectionSet = Vec<Detection>;

/// Parsed inbound message.
#[derive(Debug, PartialEq)]
pub enum InboundMessage {
    Detections(DetectionSet),
    ServiceError(String),
}

#[derive(Deserialize)]
struct RawInbound {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detections: Option<Vec<Detection>>,
}

/// Parse one inbound text frame. A present `error` field wins over any
/// `detections` field; a message with neither is treated as empty.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, PipelineError> {
    let raw: RawInbound = serde_json::from_str(text)?;
    if let Some(err) = raw.error {
        return Ok(InboundMessage::ServiceError(err));
    }
    Ok(InboundMessage::Detections(raw.detections.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detections() {
        let msg = parse_inbound(
            r#"{"detections":[{"xyxy":[100.0,50.0,200.0,150.0],"label":"no_helmet","conf":0.91}]}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::Detections(dets) => {
                assert_eq!(dets.len(), 1);
                assert_eq!(dets[0].xyxy, [100.0, 50.0, 200.0, 150.0]);
                assert_eq!(dets[0].label, "no_helmet");
                assert!((dets[0].conf - 0.91).abs() < 1e-6);
            }
            other => panic!("expected detections, got {other:?}"),
        }
    }

    #[test]
    fn error_field_wins() {
        let msg = parse_inbound(r#"{"error":"inference error: oom"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::ServiceError("inference error: oom".into())
        );
    }

    #[test]
    fn missing_label_defaults_to_empty() {
        let msg = parse_inbound(r#"{"detections":[{"xyxy":[0,0,1,1],"conf":0.5}]}"#).unwrap();
        match msg {
            InboundMessage::Detections(dets) => assert_eq!(dets[0].label, ""),
            other => panic!("expected detections, got {other:?}"),
        }
    }

    #[test]
    fn empty_object_is_an_empty_detection_set() {
        let msg = parse_inbound("{}").unwrap();
        assert_eq!(msg, InboundMessage::Detections(vec![]));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = parse_inbound("{not json").unwrap_err();
        assert!(matches!(err, PipelineError::MessageDecode(_)));
    }

    #[test]
    fn outbound_payload_shape() {
        let payload = FramePayload {
            image: "data:image/jpeg;base64,abc".into(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"image":"data:image/jpeg;base64,abc"}"#);
    }
}
