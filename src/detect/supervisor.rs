//! Connection lifecycle state machine.
//!
//! Two orthogonal signals are tracked: the pipeline status enum
//! (`Idle → Connecting → {Streaming | Error}`) and a transport-open flag.
//! "Socket open" and "camera plus overlay fully operational" are distinct
//! conditions; a peer-initiated close flips the flag without demoting the
//! status. Streaming is entered only once the transport is open AND the
//! camera has produced a frame, in whichever order those happen.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{error, info};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    Connecting,
    Streaming,
    Error,
}

impl PipelineStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PipelineStatus::Connecting,
            2 => PipelineStatus::Streaming,
            3 => PipelineStatus::Error,
            _ => PipelineStatus::Idle,
        }
    }
}

#[derive(Default)]
pub struct Supervisor {
    status: AtomicU8,
    transport_open: AtomicBool,
    camera_ready: AtomicBool,
    banner: ArcSwapOption<String>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn transport_open(&self) -> bool {
        self.transport_open.load(Ordering::Acquire)
    }

    /// User-facing message for the current fatal error, if any.
    pub fn banner(&self) -> Option<Arc<String>> {
        self.banner.load_full()
    }

    /// Session init has started.
    pub fn begin_connecting(&self) {
        self.status
            .store(PipelineStatus::Connecting as u8, Ordering::Release);
    }

    /// The transport handshake completed.
    pub fn transport_opened(&self) {
        self.transport_open.store(true, Ordering::Release);
        info!("Detector connection open");
        self.maybe_streaming();
    }

    /// The camera delivered its first frame; dimensions are now known.
    pub fn camera_ready(&self) {
        if !self.camera_ready.swap(true, Ordering::AcqRel) {
            info!("Camera ready");
        }
        self.maybe_streaming();
    }

    /// Peer close or network failure on an open transport. Orthogonal to
    /// the status enum: the feed keeps rendering, sends become no-ops.
    pub fn transport_closed(&self) {
        if self.transport_open.swap(false, Ordering::AcqRel) {
            info!("Detector connection closed");
        }
    }

    /// Record a fatal failure. Non-fatal errors are the caller's to log;
    /// they never reach here.
    pub fn fail(&self, err: &PipelineError) {
        debug_assert!(err.is_fatal());
        let msg = match err.hint() {
            Some(hint) => format!("{err} — {hint}"),
            None => err.to_string(),
        };
        error!("{msg}");
        self.banner.store(Some(Arc::new(msg)));
        self.status
            .store(PipelineStatus::Error as u8, Ordering::Release);
    }

    /// Terminal teardown; safe to call repeatedly.
    pub fn teardown(&self) {
        self.transport_open.store(false, Ordering::Release);
        self.camera_ready.store(false, Ordering::Release);
        self.status.store(PipelineStatus::Idle as u8, Ordering::Release);
    }

    fn maybe_streaming(&self) {
        if self.transport_open.load(Ordering::Acquire)
            && self.camera_ready.load(Ordering::Acquire)
        {
            // Only promote out of Connecting; never resurrect an Error state.
            let _ = self.status.compare_exchange(
                PipelineStatus::Connecting as u8,
                PipelineStatus::Streaming as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}
