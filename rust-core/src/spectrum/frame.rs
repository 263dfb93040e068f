//! Frame transform engine
//!
//! Turns a waveform source into one magnitude spectrum per channel per frame.
//! Frames are `block_len` samples long and start `hop_len` samples apart. The
//! overlapping tail of the previous block is kept in a per-channel ring so each
//! frame only reads the samples it has not seen yet; when hops are longer than
//! the block, the gap is skipped with a forward seek before the next read.

use ndarray::{Array2, Array3, Axis};
use ringbuf::{HeapRb, Rb};
use std::time::Duration;

use super::fft::FftEngine;
use super::windowing::{generate_window, WindowType};
use crate::error::{Result, SpectrumError};
use crate::source::{ReadOrder, WaveformSource};

/// Windowed, hop-aware FFT over a waveform source
pub struct FrameTransform<S: WaveformSource> {
    source: S,
    engine: FftEngine,

    /// Precomputed taper, one weight per block sample
    window: Vec<f64>,

    /// Samples of the upcoming block already read from the source, per channel
    rings: Vec<HeapRb<f64>>,

    /// Sample-major read buffer, resized only when the read length changes
    read_buffer: Array2<f64>,

    block_len: usize,
    hop_len: usize,

    /// Samples to skip before the next read (hop longer than block)
    pending_skip: usize,
}

impl<S: WaveformSource> FrameTransform<S> {
    /// Create a transform reading `block_len` samples per frame, advancing `hop_len`
    ///
    /// # Arguments
    /// * `source` - Waveform to analyse, read from its current position
    /// * `block_len` - Samples per analysis block (at least 2)
    /// * `hop_len` - Samples between the starts of consecutive frames
    /// * `window_type` - Taper applied to every block
    pub fn new(source: S, block_len: usize, hop_len: usize, window_type: WindowType) -> Result<Self> {
        if block_len < 2 {
            return Err(SpectrumError::invalid(format!(
                "analysis block must hold at least 2 samples (got {})",
                block_len
            )));
        }
        if hop_len == 0 {
            return Err(SpectrumError::invalid("hop length must be positive"));
        }

        let channels = source.channels();
        let rings = (0..channels).map(|_| HeapRb::new(block_len)).collect();

        log::info!(
            "Frame transform: block {} samples ({:.1} ms), hop {} samples, {} channels, {:?} window",
            block_len,
            block_len as f64 * 1000.0 / source.sample_rate() as f64,
            hop_len,
            channels,
            window_type
        );

        Ok(Self {
            engine: FftEngine::new(block_len),
            window: generate_window(window_type, block_len),
            rings,
            read_buffer: Array2::zeros((block_len, channels)),
            block_len,
            hop_len,
            pending_skip: 0,
            source,
        })
    }

    /// Samples still needed from the source to complete the next block
    fn samples_needed(&self) -> usize {
        self.block_len - self.buffered()
    }

    fn buffered(&self) -> usize {
        self.rings.first().map_or(0, |ring| ring.len())
    }

    /// True when at least one more full block is available
    pub fn has_next(&self) -> bool {
        self.source.has(self.pending_skip + self.samples_needed())
    }

    /// Compute the next frame into `out`, shaped `[spectrum_len × channels]`
    pub fn compute_into(&mut self, out: &mut Array2<f64>) -> Result<()> {
        if out.dim() != (self.spectrum_len(), self.channels()) {
            return Err(SpectrumError::invalid(format!(
                "spectrum buffer has shape {:?}, expected {:?}",
                out.dim(),
                (self.spectrum_len(), self.channels())
            )));
        }

        self.fill()?;

        for (c, ring) in self.rings.iter().enumerate() {
            let input = self.engine.input_mut();
            for ((dst, &sample), &w) in input.iter_mut().zip(ring.iter()).zip(self.window.iter()) {
                *dst = sample * w;
            }

            let mut column = out.column_mut(c);
            self.engine.execute(column.iter_mut())?;
        }

        self.advance();
        Ok(())
    }

    /// Compute the next frame into a freshly allocated buffer
    pub fn compute(&mut self) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((self.spectrum_len(), self.channels()));
        self.compute_into(&mut out)?;
        Ok(out)
    }

    /// Number of complete frames in the whole signal
    pub fn frame_count(&self) -> usize {
        let frames = self.source.frames();
        if frames < self.block_len {
            0
        } else {
            (frames - self.block_len) / self.hop_len + 1
        }
    }

    /// Transform the whole signal from its first sample
    ///
    /// # Returns
    /// `[frames × spectrum_len × channels]` magnitudes; the source is rewound
    /// afterwards so streaming starts from the first sample again.
    pub fn compute_all(&mut self) -> Result<Array3<f64>> {
        self.reset()?;

        let count = self.frame_count();
        let mut all = Array3::zeros((count, self.spectrum_len(), self.channels()));
        let mut frame = Array2::zeros((self.spectrum_len(), self.channels()));

        for mut slot in all.axis_iter_mut(Axis(0)) {
            self.compute_into(&mut frame)?;
            slot.assign(&frame);
        }

        self.reset()?;
        log::debug!("Transformed {} frames in one batch", count);
        Ok(all)
    }

    /// Top the rings up to a full block
    fn fill(&mut self) -> Result<()> {
        if self.pending_skip > 0 {
            self.source.seek(self.pending_skip as i64)?;
            self.pending_skip = 0;
        }

        let needed = self.samples_needed();
        if needed == 0 {
            return Ok(());
        }

        if self.read_buffer.nrows() != needed {
            self.read_buffer = Array2::zeros((needed, self.channels()));
        }

        self.source.read_samples(&mut self.read_buffer, ReadOrder::SampleMajor)?;

        for (c, ring) in self.rings.iter_mut().enumerate() {
            for &sample in self.read_buffer.column(c).iter() {
                ring.push_overwrite(sample);
            }
        }

        Ok(())
    }

    /// Drop the first hop of the block just transformed
    fn advance(&mut self) {
        if self.hop_len <= self.block_len {
            for ring in self.rings.iter_mut() {
                ring.skip(self.hop_len);
            }
        } else {
            self.clear_rings();
            self.pending_skip = self.hop_len - self.block_len;
        }
    }

    fn clear_rings(&mut self) {
        for ring in self.rings.iter_mut() {
            ring.clear();
        }
    }

    /// Move the start of the next frame by `offset` samples
    pub fn reposition(&mut self, offset: i64) -> Result<()> {
        let net = offset + self.pending_skip as i64 - self.buffered() as i64;
        self.source.seek(net)?;
        self.clear_rings();
        self.pending_skip = 0;
        Ok(())
    }

    /// Restart from the first sample of the source
    pub fn reset(&mut self) -> Result<()> {
        self.source.reset()?;
        self.clear_rings();
        self.pending_skip = 0;
        Ok(())
    }

    /// Number of magnitudes per channel in each frame
    pub fn spectrum_len(&self) -> usize {
        self.engine.num_bins()
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn hop_len(&self) -> usize {
        self.hop_len
    }

    pub fn channels(&self) -> usize {
        self.rings.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Duration actually covered by one block
    pub fn effective_window(&self) -> Duration {
        Duration::from_secs_f64(self.block_len as f64 / self.source.sample_rate() as f64)
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
