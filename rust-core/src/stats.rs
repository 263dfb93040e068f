//! Level statistics for normalization
//!
//! Before streaming starts, short bursts spread over the whole signal are
//! analysed to seed a mean/variance estimate of the binned dB levels. The
//! estimate is then refined online as real frames are produced.

use ndarray::Array2;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::source::WaveformSource;
use crate::spectrum::{combine_channels_avg, db_conversion, BinSpec, FrameTransform};

/// Incrementally maintained sample mean and variance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    mean: f64,
    variance: f64,
    count: u64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            mean: f64::NAN,
            variance: f64::NAN,
            count: 0,
        }
    }
}

impl RunningStats {
    /// Two-pass estimate over the finite values of `values` (Bessel-corrected)
    pub fn from_samples(values: &[f64]) -> Self {
        let finite = || values.iter().copied().filter(|v| v.is_finite());

        let count = finite().count();
        if count == 0 {
            return Self::default();
        }

        let mean = finite().sum::<f64>() / count as f64;
        let variance = if count > 1 {
            finite().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (count - 1) as f64
        } else {
            0.0
        };

        Self {
            mean,
            variance,
            count: count as u64,
        }
    }

    /// Fold one value into the estimate; non-finite values are ignored.
    ///
    /// Returns whether the value was accepted.
    pub fn push(&mut self, x: f64) -> bool {
        if !x.is_finite() {
            return false;
        }

        if self.count == 0 {
            self.mean = x;
            self.variance = 0.0;
            self.count = 1;
            return true;
        }

        // n is the count before this value; (n - 1) * var is the previous sum of squares
        let n = self.count as f64;
        let mean = (self.mean * n + x) / (n + 1.0);
        self.variance = ((n - 1.0) * self.variance + (x - mean) * (x - self.mean)) / n;
        self.mean = mean;
        self.count += 1;
        true
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn stddev(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Calibration pass over sparse bursts of the signal
#[derive(Debug, Clone)]
pub struct DistributionEstimator {
    /// Number of bursts across the signal
    bursts: usize,

    /// Frames computed per burst
    burst_frames: usize,

    /// Output frames between burst starts
    stride_frames: usize,

    /// Samples skipped after each burst
    gap_samples: i64,
}

impl DistributionEstimator {
    /// Plan the calibration bursts for a signal of `source` length
    pub fn new<S: WaveformSource>(config: &StreamConfig, source: &S) -> Self {
        let length = source.duration().as_secs_f64();
        let stride = config.estimate_stride().as_secs_f64();
        let gap = stride - config.estimate_burst().as_secs_f64();

        Self {
            bursts: ((length / stride).floor() as usize).max(1),
            burst_frames: config.burst_frames(),
            stride_frames: config.stride_frames().max(1),
            gap_samples: (gap * source.sample_rate() as f64).floor() as i64,
        }
    }

    pub fn bursts(&self) -> usize {
        self.bursts
    }

    pub fn burst_frames(&self) -> usize {
        self.burst_frames
    }

    /// True when streaming frame `index` overlaps a calibration burst
    pub fn is_calibration_frame(&self, index: usize) -> bool {
        index % self.stride_frames <= self.burst_frames
    }

    /// Run the calibration pass and rewind the transform to the first sample.
    ///
    /// Any read or seek failure aborts the estimate.
    pub fn estimate<S: WaveformSource>(
        &self,
        transform: &mut FrameTransform<S>,
        spec: &BinSpec,
    ) -> Result<RunningStats> {
        log::info!(
            "Estimating level distribution: {} bursts of {} frames, {} samples between bursts, {} FFTs",
            self.bursts,
            self.burst_frames,
            self.gap_samples,
            self.bursts * self.burst_frames * transform.channels()
        );

        transform.reset()?;

        let channels = transform.channels();
        let bins = spec.bins();
        let mut spectrum = Array2::zeros((transform.spectrum_len(), channels));
        let mut binned = Array2::zeros((channels, bins));
        let mut combined = vec![0.0; bins];
        let mut values = Vec::with_capacity(self.bursts * self.burst_frames * bins);

        'bursts: for burst in 0..self.bursts {
            for _ in 0..self.burst_frames {
                if !transform.has_next() {
                    log::warn!("Signal ended inside calibration burst {}", burst);
                    break 'bursts;
                }

                transform.compute_into(&mut spectrum)?;
                spec.bin(spectrum.view(), &mut binned)?;
                combine_channels_avg(binned.view(), &mut combined)?;
                db_conversion(combined.iter_mut());
                values.extend_from_slice(&combined);
            }

            if burst + 1 < self.bursts {
                transform.reposition(self.gap_samples)?;
            }
        }

        transform.reset()?;

        let stats = RunningStats::from_samples(&values);
        log::info!(
            "Estimated mean {:.3} dB, stddev {:.3} dB from {} values",
            stats.mean(),
            stats.stddev(),
            stats.count()
        );

        Ok(stats)
    }
}
