//! Spectral analysis: windowing, FFT, framing and binning

pub mod fft;
pub mod windowing;
pub mod frame;
pub mod binning;

pub use fft::FftEngine;
pub use windowing::{generate_window, window_weight, WindowType};
pub use frame::FrameTransform;
pub use binning::{combine_channels_avg, db_conversion, BinSpec};
