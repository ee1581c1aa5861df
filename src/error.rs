//! Pipeline error taxonomy.
//!
//! Only [`PipelineError::DeviceAcquisition`] and
//! [`PipelineError::TransportOpen`] are fatal to a session; everything else
//! is isolated to the single tick or message that produced it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Camera denied or unavailable. Fatal to the session.
    #[error("camera unavailable: {0}")]
    DeviceAcquisition(String),

    /// The connection to the detection service could not be established.
    /// Fatal to the session.
    #[error("could not reach detection service: {0}")]
    TransportOpen(String),

    /// Async error on an already-open connection. Logged, non-fatal.
    #[error("transport error: {0}")]
    TransportRuntime(String),

    /// Malformed inbound payload. Logged and dropped.
    #[error("bad message from detection service: {0}")]
    MessageDecode(#[from] serde_json::Error),

    /// A frame could not be decoded or re-encoded on a sampling tick.
    #[error("frame encode/decode failed: {0}")]
    FrameDecode(String),

    /// The service answered with its `error` field set. Logged, non-fatal.
    #[error("detection service reported: {0}")]
    ServiceReported(String),
}

impl PipelineError {
    /// Whether this error terminates the session (vs. one tick/message).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::DeviceAcquisition(_) | PipelineError::TransportOpen(_)
        )
    }

    /// Operator-facing remediation hint for fatal errors.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            PipelineError::DeviceAcquisition(_) => {
                Some("check camera permissions and that no other program holds the device")
            }
            PipelineError::TransportOpen(_) => {
                Some("is the detection service running? (expected a WebSocket endpoint, e.g. ws://localhost:8000/ws/detect)")
            }
            _ => None,
        }
    }
}
