//! Normalization and smoothing of binned frames
//!
//! Per frame, each channel is rescaled between two percentile thresholds of the
//! running level distribution, smoothed across neighbouring bins, and finally
//! blended with the previous frame's output.

use ndarray::{Array2, ArrayViewMut1};

use crate::config::StreamConfig;
use crate::stats::RunningStats;

/// Inverse error function
///
/// Giles' single-precision polynomial evaluated in f64; absolute error below 1e-7
/// over (-1, 1). Returns ±inf at ±1 and NaN outside [-1, 1].
pub fn erf_inv(x: f64) -> f64 {
    if x.is_nan() || x.abs() > 1.0 {
        return f64::NAN;
    }
    if x.abs() == 1.0 {
        return x * f64::INFINITY;
    }

    let mut w = -((1.0 - x) * (1.0 + x)).ln();
    let p = if w < 5.0 {
        w -= 2.5;
        [
            3.43273939e-07,
            -3.5233877e-06,
            -4.39150654e-06,
            0.00021858087,
            -0.00125372503,
            -0.00417768164,
            0.246640727,
            1.50140941,
        ]
        .iter()
        .fold(2.81022636e-08, |p, &c| c + p * w)
    } else {
        w = w.sqrt() - 3.0;
        [
            0.000100950558,
            0.00134934322,
            -0.00367342844,
            0.00573950773,
            -0.0076224613,
            0.00943887047,
            1.00167406,
            2.83297682,
        ]
        .iter()
        .fold(-0.000200214257, |p, &c| c + p * w)
    };

    p * x
}

/// Value below which a fraction `p` of a normal distribution lies
pub fn percentile_threshold(mean: f64, stddev: f64, p: f64) -> f64 {
    mean + stddev * std::f64::consts::SQRT_2 * erf_inv(2.0 * p - 1.0)
}

/// Rescale so the `p_low` percentile maps to 0 and the `1 - p_high` percentile to 1.
///
/// Results are not clamped.
pub fn normalize_extrema(data: ArrayViewMut1<f64>, stats: &RunningStats, p_low: f64, p_high: f64) {
    let stddev = stats.stddev();
    let low = percentile_threshold(stats.mean(), stddev, p_low);
    let high = percentile_threshold(stats.mean(), stddev, 1.0 - p_high);
    normalize_about(data, low, high);
}

fn normalize_about(mut data: ArrayViewMut1<f64>, min: f64, max: f64) {
    let range = max - min;
    data.mapv_inplace(|v| (v - min) / range);
}

/// Moving average across neighbouring bins
///
/// Each pass replaces bin i with the mean of bins `i - half..=i + half`
/// (half = points / 2); the `half` bins at either edge pass through.
#[derive(Debug, Clone)]
pub struct SpatialSmoother {
    passes: usize,
    half_width: usize,
    scratch: Vec<f64>,
}

impl SpatialSmoother {
    pub fn new(passes: usize, points: usize) -> Self {
        Self {
            passes,
            half_width: points / 2,
            scratch: Vec::new(),
        }
    }

    pub fn apply(&mut self, mut data: ArrayViewMut1<f64>) {
        let len = data.len();
        let side = self.half_width;
        if self.passes == 0 || side == 0 || len <= 2 * side {
            return;
        }

        let weight = 1.0 / (2 * side + 1) as f64;
        self.scratch.resize(len, 0.0);

        for _ in 0..self.passes {
            for (dst, &v) in self.scratch.iter_mut().zip(data.iter()) {
                *dst = v;
            }
            for i in side..len - side {
                data[i] = self.scratch[i - side..=i + side].iter().sum::<f64>() * weight;
            }
        }
    }
}

/// Exponential smoothing against the previous frame's output
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    alpha: f64,
    previous: Option<Array2<f64>>,
}

impl TemporalSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            previous: None,
        }
    }

    /// out = α·new + (1-α)·previous, element-wise where both are finite.
    ///
    /// The first frame passes through; every output is cached for the next call.
    pub fn apply(&mut self, frame: &mut Array2<f64>) {
        let has_previous = self
            .previous
            .as_ref()
            .map_or(false, |previous| previous.dim() == frame.dim());
        if !has_previous {
            self.previous = Some(frame.clone());
            return;
        }

        if let Some(previous) = self.previous.as_mut() {
            let keep = 1.0 - self.alpha;
            for (v, &old) in frame.iter_mut().zip(previous.iter()) {
                if v.is_finite() && old.is_finite() {
                    *v = self.alpha * *v + keep * old;
                }
            }
            previous.assign(&*frame);
        }
    }

    /// Forget the previous frame
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Post-binning conditioning of `[channels × bins]` dB frames
#[derive(Debug, Clone)]
pub struct FrameConditioner {
    percentile_low: f64,
    percentile_high: f64,
    spatial: SpatialSmoother,
    temporal: TemporalSmoother,
}

impl FrameConditioner {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            percentile_low: config.percentile_low,
            percentile_high: config.percentile_high,
            spatial: SpatialSmoother::new(config.smoothing_passes, config.smoothing_points),
            temporal: TemporalSmoother::new(config.smoothing_alpha),
        }
    }

    /// Normalize and spatially smooth every channel, then smooth across time
    pub fn apply(&mut self, frame: &mut Array2<f64>, stats: &RunningStats) {
        for mut row in frame.rows_mut() {
            normalize_extrema(row.view_mut(), stats, self.percentile_low, self.percentile_high);
            self.spatial.apply(row);
        }
        self.temporal.apply(frame);
    }
}
