//! Error types for the spectral streaming pipeline

use thiserror::Error;

/// Errors raised while reading audio or building/running the pipeline
#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("Short read: requested {requested} samples but only {available} remain")]
    ShortRead { requested: usize, available: usize },

    #[error("Seek by {offset} samples from position {position} leaves the valid range 0..={frames}")]
    SeekOutOfRange {
        position: usize,
        offset: i64,
        frames: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("FFT execution failed: {0}")]
    Transform(String),

    #[error("Failed to decode WAV data: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl SpectrumError {
    /// Shorthand for an `InvalidConfiguration` error
    pub fn invalid(msg: impl Into<String>) -> Self {
        SpectrumError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpectrumError>;
