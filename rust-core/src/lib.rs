//! Spectral Stream - Frequency-Binned Spectrum Streaming Core
//!
//! Turns a recorded waveform into a stream of normalized, perceptually binned
//! spectrum frames at a fixed frame rate, with optional Python bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod config;
pub mod error;
pub mod normalize;
pub mod source;
pub mod spectrum;
pub mod stats;
pub mod stream;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use config::StreamConfig;
pub use error::{Result, SpectrumError};
pub use source::{MemorySource, ReadOrder, WaveformSource};
pub use spectrum::{BinSpec, FrameTransform, WindowType};
pub use stats::{DistributionEstimator, RunningStats};
pub use stream::{FramePacer, FrameResult, SpectrumPipeline, SpectrumStream, StreamState};
