//! Stream configuration
//!
//! Every recognized option of the analysis pipeline, loadable from TOML.
//! Durations are expressed in milliseconds.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SpectrumError};
use crate::spectrum::windowing::WindowType;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Lowest frequency assigned to a bin (Hz)
    pub f_min: f64,

    /// Highest frequency assigned to a bin (Hz)
    pub f_max: f64,

    /// Number of output bins per channel
    pub bins: usize,

    /// Perceptual gamma; values above 1 compress high-frequency resolution
    pub gamma: f64,

    /// Analysis window duration
    pub window_ms: f64,

    /// Output frames per second
    pub frame_rate: u32,

    /// Round the analysis block up to the next power of two
    pub pow_two: bool,

    /// Taper applied to every analysis block
    pub window: WindowType,

    /// Temporal smoothing factor (1 = no smoothing)
    pub smoothing_alpha: f64,

    /// Fraction of the distribution clipped below
    pub percentile_low: f64,

    /// Fraction of the distribution clipped above
    pub percentile_high: f64,

    /// Spatial smoothing passes across neighbouring bins
    pub smoothing_passes: usize,

    /// Spatial smoothing neighbourhood size (half width = points / 2)
    pub smoothing_points: usize,

    /// Duration of each calibration burst
    pub estimate_burst_ms: f64,

    /// Distance between the starts of consecutive calibration bursts
    pub estimate_stride_ms: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            f_min: 20.0,
            f_max: 18000.0,
            bins: 40,
            gamma: 2.2,
            window_ms: 165.0,
            frame_rate: 30,
            pow_two: false,
            window: WindowType::BlackmanNuttall,
            smoothing_alpha: 0.45,
            percentile_low: 0.4,
            percentile_high: 0.07,
            smoothing_passes: 1,
            smoothing_points: 3,
            estimate_burst_ms: 800.0,
            estimate_stride_ms: 6500.0,
        }
    }
}

impl StreamConfig {
    /// Parse a configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: StreamConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(SpectrumError::invalid("bin count must be positive"));
        }
        if !(self.f_min >= 0.0) || !self.f_max.is_finite() || self.f_max <= self.f_min {
            return Err(SpectrumError::invalid(format!(
                "frequency range must satisfy 0 <= f_min < f_max (got {} .. {})",
                self.f_min, self.f_max
            )));
        }
        if !(self.gamma > 0.0) || !self.gamma.is_finite() {
            return Err(SpectrumError::invalid("gamma must be a positive number"));
        }
        if !(self.window_ms > 0.0) || !self.window_ms.is_finite() {
            return Err(SpectrumError::invalid("window duration must be a positive finite number"));
        }
        if self.frame_rate == 0 {
            return Err(SpectrumError::invalid("frame rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.smoothing_alpha) {
            return Err(SpectrumError::invalid("smoothing alpha must lie in [0, 1]"));
        }

        let open_unit = |p: f64| p > 0.0 && p < 1.0;
        if !open_unit(self.percentile_low) || !open_unit(self.percentile_high) {
            return Err(SpectrumError::invalid("percentiles must lie in (0, 1)"));
        }
        if self.percentile_low >= 1.0 - self.percentile_high {
            return Err(SpectrumError::invalid(
                "low percentile must sit below the high clip point (1 - percentile_high)",
            ));
        }

        if self.smoothing_passes > 0 && self.smoothing_points == 0 {
            return Err(SpectrumError::invalid(
                "spatial smoothing needs at least one point per pass",
            ));
        }
        if !self.estimate_burst_ms.is_finite() || !self.estimate_stride_ms.is_finite() {
            return Err(SpectrumError::invalid("calibration durations must be finite"));
        }
        if !(self.estimate_burst_ms > 0.0) || self.estimate_stride_ms <= self.estimate_burst_ms {
            return Err(SpectrumError::invalid(
                "calibration stride must be longer than a positive burst duration",
            ));
        }
        if self.burst_frames() == 0 {
            return Err(SpectrumError::invalid(
                "calibration burst must span at least one output frame",
            ));
        }

        Ok(())
    }

    /// Time between consecutive output frames
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate as f64)
    }

    /// Samples the analysis position advances per output frame
    pub fn hop_len(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 / self.frame_rate as f64).floor() as usize
    }

    /// Samples per analysis block, rounded to a power of two when requested
    pub fn block_len(&self, sample_rate: u32) -> usize {
        let nominal = (self.window_ms / 1000.0 * sample_rate as f64).floor() as usize;
        if self.pow_two {
            nominal.max(1).next_power_of_two()
        } else {
            nominal
        }
    }

    /// Window duration actually covered by `block_len` samples
    pub fn effective_window(&self, sample_rate: u32) -> Duration {
        Duration::from_secs_f64(self.block_len(sample_rate) as f64 / sample_rate as f64)
    }

    /// Output queue capacity: ten seconds of lookahead
    pub fn queue_capacity(&self) -> usize {
        self.frame_rate as usize * 10
    }

    /// Output frames computed per calibration burst
    pub fn burst_frames(&self) -> usize {
        (self.estimate_burst_ms * self.frame_rate as f64 / 1000.0).floor() as usize
    }

    /// Output frames between the starts of two calibration bursts
    pub fn stride_frames(&self) -> usize {
        (self.estimate_stride_ms * self.frame_rate as f64 / 1000.0).floor() as usize
    }

    pub fn estimate_burst(&self) -> Duration {
        Duration::from_secs_f64(self.estimate_burst_ms / 1000.0)
    }

    pub fn estimate_stride(&self) -> Duration {
        Duration::from_secs_f64(self.estimate_stride_ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.burst_frames(), 24);
        assert_eq!(config.stride_frames(), 195);
        assert_eq!(config.queue_capacity(), 300);
    }

    #[test]
    fn test_derived_lengths() {
        let config = StreamConfig::default();
        assert_eq!(config.hop_len(44100), 1470);
        assert_eq!(config.block_len(44100), 7276);

        let rounded = StreamConfig {
            pow_two: true,
            ..StreamConfig::default()
        };
        assert_eq!(rounded.block_len(44100), 8192);

        // Effective duration follows the rounded block, not the request
        let effective = rounded.effective_window(44100).as_secs_f64();
        assert!((effective - 8192.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn test_toml_partial_override() {
        let config = StreamConfig::from_toml_str(
            r#"
            bins = 24
            gamma = 2.0
            window = "hann"
            "#,
        )
        .unwrap();

        assert_eq!(config.bins, 24);
        assert_eq!(config.gamma, 2.0);
        assert_eq!(config.window, WindowType::Hann);
        assert_eq!(config.frame_rate, 30);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            StreamConfig { bins: 0, ..StreamConfig::default() },
            StreamConfig { f_min: 500.0, f_max: 100.0, ..StreamConfig::default() },
            StreamConfig { gamma: 0.0, ..StreamConfig::default() },
            StreamConfig { smoothing_alpha: 1.5, ..StreamConfig::default() },
            StreamConfig { percentile_low: 0.95, ..StreamConfig::default() },
            StreamConfig { estimate_stride_ms: 500.0, ..StreamConfig::default() },
            StreamConfig { frame_rate: 0, ..StreamConfig::default() },
            StreamConfig { estimate_stride_ms: f64::INFINITY, ..StreamConfig::default() },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(SpectrumError::InvalidConfiguration(_))),
                "expected rejection for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_rejects_non_finite_durations_from_toml() {
        for text in ["window_ms = inf\n", "window_ms = nan\n", "estimate_burst_ms = inf\n"] {
            assert!(
                matches!(
                    StreamConfig::from_toml_str(text),
                    Err(SpectrumError::InvalidConfiguration(_))
                ),
                "expected rejection for {:?}",
                text
            );
        }
    }
}
