//! Waveform sources feeding the analysis pipeline
//!
//! The pipeline only needs random access over a decoded, normalized waveform.
//! `MemorySource` holds the whole signal in memory; WAV files are decoded into it.

pub mod memory;

pub use memory::MemorySource;

use ndarray::Array2;
use std::time::Duration;

use crate::error::Result;

/// Layout of the buffer passed to [`WaveformSource::read_samples`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrder {
    /// `[samples × channels]`
    SampleMajor,
    /// `[channels × samples]`
    ChannelMajor,
}

/// Random-access reader over a multi-channel waveform with samples in [-1, 1]
pub trait WaveformSource: Send {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn bit_depth(&self) -> u16;

    /// Total number of samples per channel
    fn frames(&self) -> usize;

    /// Time between two consecutive samples
    fn timebase(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sample_rate() as f64)
    }

    /// Total signal duration
    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate() as f64)
    }

    /// True when at least `n` samples remain after the cursor
    fn has(&self, n: usize) -> bool;

    /// Move the cursor by a signed number of samples
    fn seek(&mut self, offset: i64) -> Result<()>;

    /// Move the cursor back to the first sample
    fn reset(&mut self) -> Result<()>;

    /// Fill `to` with the next samples in the given layout and advance the cursor.
    ///
    /// The number of samples read is the buffer's sample dimension; fails with
    /// `ShortRead` (leaving the cursor untouched) when fewer remain.
    fn read_samples(&mut self, to: &mut Array2<f64>, order: ReadOrder) -> Result<usize>;
}
