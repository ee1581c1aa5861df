//! Single-slot, last-write-wins cells shared between the pipeline tasks.
//!
//! These are the only shared mutable state in the system: the receive path
//! overwrites, the render path snapshots. Nothing is queued, so neither
//! cell can grow and a slow consumer only ever costs staleness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::capture::Frame;
use crate::detect::DetectionSet;

/// Latest detection set plus a monotonically increasing received counter.
/// Older unconsumed results are discarded by design.
#[derive(Default)]
pub struct ResultSlot {
    latest: ArcSwap<DetectionSet>,
    received: AtomicU64,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with a newly arrived result.
    pub fn publish(&self, set: DetectionSet) {
        self.latest.store(Arc::new(set));
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the current detection set without blocking on arrival.
    pub fn snapshot(&self) -> Arc<DetectionSet> {
        self.latest.load_full()
    }

    /// How many result messages have been applied so far.
    pub fn frames_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Latest live frame, published by the capture task and read by both the
/// render loop and the sampler. `None` until the first frame arrives.
#[derive(Default)]
pub struct FrameCell {
    latest: ArcSwapOption<Frame>,
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        self.latest.store(Some(Arc::new(frame)));
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.load_full()
    }
}
