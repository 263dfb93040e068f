//! Real-input FFT with owned plan and buffers
//!
//! Owns the forward plan and every buffer it touches, so planning happens once
//! per block length and nothing is shared between engines.

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{Result, SpectrumError};

/// Forward real FFT of a fixed length
pub struct FftEngine {
    /// Samples per transform
    fft_size: usize,

    /// Forward plan
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer, destroyed by every transform
    input_buffer: Vec<f64>,

    /// Half spectrum, fft_size/2 + 1 values
    output_buffer: Vec<Complex<f64>>,

    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Plan a transform of `fft_size` samples
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
            scratch,
        }
    }

    /// Time-domain buffer to fill before calling [`FftEngine::execute`]
    pub fn input_mut(&mut self) -> &mut [f64] {
        &mut self.input_buffer
    }

    /// Transform the input buffer and write |X[k]| for k = 0..=fft_size/2 into `out`
    pub fn execute<'a>(&mut self, out: impl IntoIterator<Item = &'a mut f64>) -> Result<()> {
        self.r2c
            .process_with_scratch(
                &mut self.input_buffer,
                &mut self.output_buffer,
                &mut self.scratch,
            )
            .map_err(|e| SpectrumError::Transform(e.to_string()))?;

        for (dst, c) in out.into_iter().zip(self.output_buffer.iter()) {
            *dst = c.norm();
        }

        Ok(())
    }

    /// Compute the magnitude spectrum of `signal` (zero-padded or truncated to fft_size)
    pub fn compute_magnitude(&mut self, signal: &[f64]) -> Result<Vec<f64>> {
        let copy_len = signal.len().min(self.fft_size);
        self.input_buffer[..copy_len].copy_from_slice(&signal[..copy_len]);
        self.input_buffer[copy_len..].fill(0.0);

        let mut magnitude = vec![0.0; self.num_bins()];
        self.execute(magnitude.iter_mut())?;
        Ok(magnitude)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Magnitudes produced per transform
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Centre frequency of output bin `k` in Hz
    pub fn bin_to_hz(&self, k: usize, sample_rate: u32) -> f64 {
        k as f64 * sample_rate as f64 / self.fft_size as f64
    }
}
