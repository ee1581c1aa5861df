//! Duplex channel to the detection service.
//!
//! One connection per session. The writer side drains a bounded(1) queue:
//! if a payload is still waiting when the next one arrives, the new send
//! fails and that sampling tick is simply lost. Backpressure is resolved
//! by frame loss, never by delay accumulation.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::detect::supervisor::Supervisor;
use crate::detect::wire::{self, FramePayload, InboundMessage};
use crate::error::PipelineError;
use crate::pipeline::slot::ResultSlot;

pub struct Channel {
    outbound: flume::Sender<FramePayload>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    supervisor: Arc<Supervisor>,
}

/// Cheap clonable sender used by the frame sampler; sends become no-ops
/// the moment the transport is no longer open.
#[derive(Clone)]
pub struct ChannelHandle {
    outbound: flume::Sender<FramePayload>,
    supervisor: Arc<Supervisor>,
}

impl ChannelHandle {
    /// Hand a payload to the writer if the transport is open and the queue
    /// has room. Returns whether the payload was accepted; a `false` is a
    /// dropped tick, not an error.
    pub fn send(&self, payload: FramePayload) -> bool {
        if !self.supervisor.transport_open() {
            return false;
        }
        match self.outbound.try_send(payload) {
            Ok(()) => true,
            Err(_) => {
                metrics::counter!("detector_sends_dropped").increment(1);
                false
            }
        }
    }
}

impl Channel {
    /// Establish the connection and spawn the reader/writer tasks.
    /// A handshake failure is fatal to the session; the caller decides
    /// what to do with the supervisor.
    pub async fn open(
        endpoint: &str,
        slot: Arc<ResultSlot>,
        supervisor: Arc<Supervisor>,
    ) -> Result<Self, PipelineError> {
        info!("Connecting to detection service at {endpoint}");
        let (ws, _) = connect_async(endpoint)
            .await
            .map_err(|e| PipelineError::TransportOpen(e.to_string()))?;
        supervisor.transport_opened();

        let (mut sink, mut stream) = ws.split();

        // At most one payload queued; try_send failures drop the frame.
        let (tx, rx) = flume::bounded::<FramePayload>(1);

        let writer = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move {
                while let Ok(payload) = rx.recv_async().await {
                    let json = match serde_json::to_string(&payload) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize frame payload: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json.into())).await {
                        warn!("Frame send failed: {e}");
                        break;
                    }
                }
                let _ = sink.close().await;
                // A dead write half means the connection is gone even if
                // the read half never reports an error.
                supervisor.transport_closed();
            })
        };

        let reader = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move {
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(Message::Text(text)) => apply_inbound(&text, &slot),
                        Ok(Message::Close(_)) => {
                            debug!("Peer closed the detector connection");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            // Runtime errors on an open connection are logged,
                            // never promoted to a status change.
                            warn!("{}", PipelineError::TransportRuntime(e.to_string()));
                            break;
                        }
                    }
                }
                supervisor.transport_closed();
            })
        };

        Ok(Self {
            outbound: tx,
            writer: Some(writer),
            reader: Some(reader),
            supervisor,
        })
    }

    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            outbound: self.outbound.clone(),
            supervisor: self.supervisor.clone(),
        }
    }

    /// Tear the connection down. Idempotent; callable whether or not the
    /// reader/writer are still alive.
    pub fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.supervisor.transport_closed();
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Apply one inbound text frame to the result slot. Error payloads and
/// malformed messages are observed in the logs and otherwise dropped; a
/// single bad message never stops the pipeline.
fn apply_inbound(text: &str, slot: &ResultSlot) {
    match wire::parse_inbound(text) {
        Ok(InboundMessage::Detections(set)) => {
            metrics::counter!("detector_results_received").increment(1);
            slot.publish(set);
        }
        Ok(InboundMessage::ServiceError(msg)) => {
            warn!("{}", PipelineError::ServiceReported(msg));
        }
        Err(e) => {
            warn!("Dropping inbound message: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_inbound_leaves_slot_unchanged() {
        let slot = ResultSlot::new();
        slot.publish(vec![]);

        apply_inbound("{not json", &slot);
        assert_eq!(slot.frames_received(), 1);

        // A subsequent valid message still applies.
        apply_inbound(
            r#"{"detections":[{"xyxy":[1,2,3,4],"label":"helmet","conf":0.8}]}"#,
            &slot,
        );
        assert_eq!(slot.frames_received(), 2);
        assert_eq!(slot.snapshot()[0].label, "helmet");
    }

    #[test]
    fn send_is_a_no_op_until_transport_opens_and_drops_when_full() {
        let (tx, rx) = flume::bounded(1);
        let supervisor = Arc::new(Supervisor::new());
        let handle = ChannelHandle {
            outbound: tx,
            supervisor: supervisor.clone(),
        };
        let payload = || FramePayload {
            image: "data:image/jpeg;base64,".into(),
        };

        assert!(!handle.send(payload()));
        assert!(rx.is_empty());

        supervisor.transport_opened();
        assert!(handle.send(payload()));
        // Queue holds one payload; the next tick is lost, not delayed.
        assert!(!handle.send(payload()));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn sends_are_gated_off_once_the_transport_closes() {
        // Queue capacity 2 so the gate, not a full queue, is what blocks.
        let (tx, rx) = flume::bounded(2);
        let supervisor = Arc::new(Supervisor::new());
        let handle = ChannelHandle {
            outbound: tx,
            supervisor: supervisor.clone(),
        };
        let payload = || FramePayload {
            image: "data:image/jpeg;base64,".into(),
        };

        supervisor.transport_opened();
        assert!(handle.send(payload()));

        // What the writer task signals when its send half dies.
        supervisor.transport_closed();
        assert!(!handle.send(payload()));
        assert!(!supervisor.transport_open());
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn service_error_does_not_bump_the_counter() {
        let slot = ResultSlot::new();
        apply_inbound(r#"{"error":"no image provided"}"#, &slot);
        assert_eq!(slot.frames_received(), 0);
        assert!(slot.snapshot().is_empty());
    }
}
