//! Frame-rate pacing for queued frames

use crossbeam_channel::{tick, Receiver};
use std::time::{Duration, Instant};

use super::FrameResult;

/// Releases at most one frame per tick
///
/// Ticks come from any `Receiver<Instant>`: [`crossbeam_channel::tick`] in
/// production, a hand-driven channel in tests.
pub struct FramePacer {
    frames: Receiver<FrameResult>,
    ticks: Receiver<Instant>,
}

impl FramePacer {
    /// Pace `frames` with a wall-clock tick every `period`
    pub fn new(frames: Receiver<FrameResult>, period: Duration) -> Self {
        Self::with_ticks(frames, tick(period))
    }

    pub fn with_ticks(frames: Receiver<FrameResult>, ticks: Receiver<Instant>) -> Self {
        Self { frames, ticks }
    }

    /// Wait for the next tick, then for the next frame.
    ///
    /// Returns `None` when the stream has ended or the clock stopped.
    pub fn next_frame(&self) -> Option<FrameResult> {
        self.ticks.recv().ok()?;
        self.frames.recv().ok()
    }

    /// Next frame if a tick is due and a frame is queued; never blocks.
    ///
    /// A due tick is left pending while the queue is empty.
    pub fn try_next_frame(&self) -> Option<FrameResult> {
        if self.frames.is_empty() {
            return None;
        }
        self.ticks.try_recv().ok()?;
        self.frames.try_recv().ok()
    }
}

impl Iterator for FramePacer {
    type Item = FrameResult;

    fn next(&mut self) -> Option<FrameResult> {
        self.next_frame()
    }
}

/// Frames by which playback should lead display
///
/// A frame describes the block centred half a window after its start, so audio
/// started this many frames early lines up with the displayed spectrum.
pub fn pre_roll_frames(effective_window: Duration, frame_period: Duration) -> usize {
    if frame_period.is_zero() {
        return 0;
    }
    (effective_window.as_secs_f64() / 2.0 / frame_period.as_secs_f64()).floor() as usize
}
