//! Logarithmic frequency binning
//!
//! Collapses the linear FFT output into a small number of perceptually spaced
//! bins. The index ranges are computed once; binning a frame is then a series of
//! range sums.

use ndarray::{Array2, ArrayView2};

use crate::error::{Result, SpectrumError};

/// Precomputed partition of FFT output indices into bins
///
/// Bin `i` covers transform indices `boundaries[i]..boundaries[i + 1]`.
/// Indices below `f_min` never belong to a bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSpec {
    boundaries: Vec<usize>,
    spectrum_len: usize,
    freq_factor: f64,
}

impl BinSpec {
    /// Build the bin partition for a spectrum of `spectrum_len` magnitudes
    ///
    /// Bin of frequency f: floor(((f - f_min) / (f_max - f_min))^(1/gamma) * bins).
    /// Gamma above 1 gives low frequencies more bins.
    ///
    /// # Arguments
    /// * `spectrum_len` - Magnitudes per channel (block_len / 2 + 1)
    /// * `sample_rate` - Sample rate in Hz
    /// * `bins` - Number of output bins
    /// * `f_min`, `f_max` - Frequency range covered by the bins (Hz)
    /// * `gamma` - Perceptual spacing exponent
    ///
    /// # Returns
    /// `InvalidConfiguration` for a zero bin count, an empty range or a non-positive gamma
    pub fn build(
        spectrum_len: usize,
        sample_rate: u32,
        bins: usize,
        f_min: f64,
        f_max: f64,
        gamma: f64,
    ) -> Result<Self> {
        if bins == 0 {
            return Err(SpectrumError::invalid("bin count must be positive"));
        }
        if spectrum_len < 2 {
            return Err(SpectrumError::invalid("spectrum must hold at least 2 values"));
        }
        if !(f_max > f_min) {
            return Err(SpectrumError::invalid(format!(
                "f_max ({}) must exceed f_min ({})",
                f_max, f_min
            )));
        }
        if !(gamma > 0.0) {
            return Err(SpectrumError::invalid("gamma must be positive"));
        }

        let freq_factor = (sample_rate as f64 + 2.0) / (2.0 * (spectrum_len - 1) as f64);
        let inv_gamma = 1.0 / gamma;
        let last = spectrum_len - 1;

        let mut boundaries = vec![last; bins + 1];
        // Next boundary still waiting for its first index
        let mut next = 0;

        for n in 0..spectrum_len {
            let frequency = freq_factor * n as f64;
            if frequency < f_min {
                continue;
            }

            let position = ((frequency - f_min) / (f_max - f_min)).powf(inv_gamma) * bins as f64;
            let bin = (position.floor() as usize).min(bins);

            while next <= bin {
                boundaries[next] = n;
                next += 1;
            }

            if bin >= bins {
                break;
            }
        }

        let spec = Self {
            boundaries,
            spectrum_len,
            freq_factor,
        };

        for i in 0..bins {
            match spec.frequency_range(i) {
                Some((lo, hi)) => log::debug!(
                    "bin[{}]: {:.1} Hz -> {:.1} Hz ({} values)",
                    i,
                    lo,
                    hi,
                    spec.boundaries[i + 1] - spec.boundaries[i]
                ),
                None => log::debug!("bin[{}]: empty", i),
            }
        }

        Ok(spec)
    }

    /// Number of bins
    pub fn bins(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// The `bins + 1` index boundaries
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Frequency in Hz assigned to transform index `n`
    pub fn index_to_hz(&self, n: usize) -> f64 {
        self.freq_factor * n as f64
    }

    /// Lowest and highest frequency inside bin `i`, `None` when the bin is empty
    pub fn frequency_range(&self, i: usize) -> Option<(f64, f64)> {
        let (start, end) = (self.boundaries[i], self.boundaries[i + 1]);
        if end > start {
            Some((self.index_to_hz(start), self.index_to_hz(end - 1)))
        } else {
            None
        }
    }

    /// Sum `spectrum` (`[spectrum_len × channels]`) into `out` (`[channels × bins]`).
    ///
    /// Bins that receive no finite value are left as NaN.
    pub fn bin(&self, spectrum: ArrayView2<f64>, out: &mut Array2<f64>) -> Result<()> {
        if spectrum.nrows() != self.spectrum_len {
            return Err(SpectrumError::invalid(format!(
                "spectrum has {} values per channel, bin spec expects {}",
                spectrum.nrows(),
                self.spectrum_len
            )));
        }
        if out.dim() != (spectrum.ncols(), self.bins()) {
            return Err(SpectrumError::invalid(format!(
                "binned buffer has shape {:?}, expected {:?}",
                out.dim(),
                (spectrum.ncols(), self.bins())
            )));
        }

        out.fill(f64::NAN);

        for (i, range) in self.boundaries.windows(2).enumerate() {
            for n in range[0]..range[1] {
                for (c, &value) in spectrum.row(n).iter().enumerate() {
                    if !value.is_finite() {
                        continue;
                    }

                    let slot = &mut out[[c, i]];
                    if slot.is_nan() {
                        *slot = 0.0;
                    }
                    *slot += value;
                }
            }
        }

        Ok(())
    }
}

/// Average `binned` (`[channels × bins]`) across channels into `out`
pub fn combine_channels_avg(binned: ArrayView2<f64>, out: &mut [f64]) -> Result<()> {
    let (channels, bins) = binned.dim();
    if channels == 0 {
        return Err(SpectrumError::invalid("cannot combine zero channels"));
    }
    if out.len() != bins {
        return Err(SpectrumError::invalid(format!(
            "combined buffer holds {} values, expected {}",
            out.len(),
            bins
        )));
    }

    out.fill(0.0);
    for row in binned.rows() {
        for (dst, &value) in out.iter_mut().zip(row.iter()) {
            *dst += value;
        }
    }

    let cs = channels as f64;
    for v in out.iter_mut() {
        *v /= cs;
    }

    Ok(())
}

/// Convert energies to decibels in place: 10 * log10(v)
///
/// Zero maps to -inf and negative or NaN input to NaN; neither is an error.
pub fn db_conversion<'a>(values: impl IntoIterator<Item = &'a mut f64>) {
    for v in values {
        *v = 10.0 * v.log10();
    }
}
