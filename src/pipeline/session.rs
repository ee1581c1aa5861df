//! Session context: every resource of one mount-to-teardown cycle in one
//! place, constructed at start and released as a unit on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::capture::{CaptureSession, Frame};
use crate::detect::{Channel, DetectionSet, PipelineStatus, Supervisor};
use crate::error::PipelineError;
use crate::pipeline::sampler;
use crate::pipeline::slot::{FrameCell, ResultSlot};
use crate::Config;

pub struct Session {
    pub frames: Arc<FrameCell>,
    pub slot: Arc<ResultSlot>,
    pub supervisor: Arc<Supervisor>,
    channel: Option<Channel>,
    capture_stop: Arc<AtomicBool>,
    capture_task: Option<JoinHandle<()>>,
    sampler_task: Option<JoinHandle<()>>,
}

/// Pull frames until the stop flag flips. The frame source blocks in the
/// driver, so this runs on the blocking pool and is stopped by the flag,
/// not by task abort (which a loop with no yield point would never see).
fn run_capture_loop<F>(
    mut next_frame: F,
    frames: &FrameCell,
    supervisor: &Supervisor,
    stop: &AtomicBool,
) where
    F: FnMut() -> color_eyre::Result<Frame>,
{
    while !stop.load(Ordering::Acquire) {
        match next_frame() {
            Ok(frame) => {
                frames.publish(frame);
                // Readiness fires on the first frame; the supervisor
                // tolerates either ordering with respect to the
                // transport opening.
                supervisor.camera_ready();
            }
            Err(e) => {
                error!("Capture error: {e}");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

impl Session {
    /// Acquire the camera, open the detector channel, and start the
    /// capture and sampling tasks. On any partial-init failure whatever
    /// was already acquired is released before the error is returned.
    pub async fn start(config: &Config) -> Result<Self, PipelineError> {
        let supervisor = Arc::new(Supervisor::new());
        supervisor.begin_connecting();

        let frames = Arc::new(FrameCell::new());
        let slot = Arc::new(ResultSlot::new());

        // Camera first; the capture session releases the device if any
        // later step fails and this function returns early.
        let mut capture = match CaptureSession::new(config.capture.clone()) {
            Ok(capture) => capture,
            Err(e) => {
                supervisor.fail(&e);
                return Err(e);
            }
        };
        if let Err(e) = capture.start_stream() {
            supervisor.fail(&e);
            return Err(e);
        }

        let channel = match Channel::open(
            &config.detector.endpoint,
            slot.clone(),
            supervisor.clone(),
        )
        .await
        {
            Ok(channel) => channel,
            Err(e) => {
                supervisor.fail(&e);
                return Err(e);
            }
        };

        let capture_stop = Arc::new(AtomicBool::new(false));
        let capture_task = {
            let frames = frames.clone();
            let supervisor = supervisor.clone();
            let stop = capture_stop.clone();
            tokio::task::spawn_blocking(move || {
                let mut capture = capture;
                run_capture_loop(|| capture.capture_frame(), &frames, &supervisor, &stop);
                // Dropping the CaptureSession here releases the stream
                // buffers and the device handle.
            })
        };

        let sampler_task = tokio::spawn(sampler::run(
            config.detector.clone(),
            frames.clone(),
            channel.handle(),
            supervisor.clone(),
        ));

        info!("Session started");
        Ok(Self {
            frames,
            slot,
            supervisor,
            channel: Some(channel),
            capture_stop,
            capture_task: Some(capture_task),
            sampler_task: Some(sampler_task),
        })
    }

    /// Observer surface consumed by UI chrome.
    pub fn observer(&self) -> PipelineObserver {
        PipelineObserver {
            supervisor: self.supervisor.clone(),
            slot: self.slot.clone(),
        }
    }

    /// Release everything: pending timers/tasks, the channel, the device.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        let already_down = self.sampler_task.is_none()
            && self.capture_task.is_none()
            && self.channel.is_none();
        if already_down {
            return;
        }
        // The capture loop exits at its next flag check (bounded by one
        // frame interval); abort cannot reach a blocking loop.
        self.capture_stop.store(true, Ordering::Release);
        drop(self.capture_task.take());
        if let Some(task) = self.sampler_task.take() {
            task.abort();
        }
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.supervisor.teardown();
        info!("Session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read-only view for status badges, stat panels and detection lists.
pub struct PipelineObserver {
    supervisor: Arc<Supervisor>,
    slot: Arc<ResultSlot>,
}

impl PipelineObserver {
    pub fn status(&self) -> PipelineStatus {
        self.supervisor.status()
    }

    pub fn transport_connected(&self) -> bool {
        self.supervisor.transport_open()
    }

    pub fn detections(&self) -> Arc<DetectionSet> {
        self.slot.snapshot()
    }

    pub fn frames_received(&self) -> u64 {
        self.slot.frames_received()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use bytes::Bytes;
    use std::sync::atomic::AtomicU64;
    use std::time::Instant;

    fn stub_frame() -> Frame {
        Frame {
            data: Bytes::from(vec![0u8; 4 * 4 * 3]),
            meta: Arc::new(FrameMetadata {
                sequence: 1,
                width: 4,
                height: 4,
                format: PixelFormat::Rgb24,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn capture_loop_honors_a_preset_stop_flag() {
        let frames = FrameCell::new();
        let supervisor = Supervisor::new();
        let stop = AtomicBool::new(true);
        run_capture_loop(|| Ok(stub_frame()), &frames, &supervisor, &stop);
        assert!(frames.latest().is_none());
    }

    #[tokio::test]
    async fn shutdown_stops_the_capture_loop_and_is_idempotent() {
        let frames = Arc::new(FrameCell::new());
        let supervisor = Arc::new(Supervisor::new());
        supervisor.begin_connecting();
        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));

        let capture_task = {
            let frames = frames.clone();
            let supervisor = supervisor.clone();
            let stop = stop.clone();
            let ticks = ticks.clone();
            tokio::task::spawn_blocking(move || {
                run_capture_loop(
                    || {
                        ticks.fetch_add(1, Ordering::Relaxed);
                        std::thread::sleep(Duration::from_millis(1));
                        Ok(stub_frame())
                    },
                    &frames,
                    &supervisor,
                    &stop,
                );
            })
        };

        let mut session = Session {
            frames: frames.clone(),
            slot: Arc::new(ResultSlot::new()),
            supervisor: supervisor.clone(),
            channel: None,
            capture_stop: stop.clone(),
            capture_task: Some(capture_task),
            sampler_task: None,
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(frames.latest().is_some());
        assert!(ticks.load(Ordering::Relaxed) > 0);

        session.shutdown();
        assert!(stop.load(Ordering::Acquire));

        // The loop sees the flag within one iteration and goes quiet.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after = ticks.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::Relaxed), after);

        // A second shutdown (and the drop that follows) must be safe.
        session.shutdown();
        assert_eq!(session.supervisor.status(), PipelineStatus::Idle);
    }
}
