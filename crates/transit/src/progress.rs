//! Progress reporting for the long precomputation passes.
//!
//! Instead of a callback, the passes push `Progress` values into a sink. The
//! sink can be a channel, so the pass may run on a worker thread while the
//! caller polls or subscribes.

use std::sync::mpsc;

use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ProcessingShapes,
    BuildingTrajectories,
    IndexingVehicles,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

impl Progress {
    pub fn new(stage: Stage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
        }
    }

    pub fn starting() -> Self {
        Self::new(Stage::ProcessingShapes, 0, "Starting")
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }
}

/// Map `done / total` into the `[from, to]` percent band of a stage
pub(crate) fn band(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = (to - from) as usize;
    from + (span * done.min(total) / total) as u8
}

/// Destination for progress updates
pub trait ProgressSink {
    fn report(&self, progress: Progress);
}

/// Discards every update
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Progress) {}
}

impl ProgressSink for mpsc::Sender<Progress> {
    fn report(&self, progress: Progress) {
        // A receiver that went away just stops listening
        let _ = self.send(progress);
    }
}

impl ProgressSink for watch::Sender<Progress> {
    fn report(&self, progress: Progress) {
        self.send_replace(progress);
    }
}
