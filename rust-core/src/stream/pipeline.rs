//! Pull-based spectral pipeline
//!
//! One call to [`SpectrumPipeline::next_frame`] runs a single frame through
//! transform, binning, statistics update, normalization and smoothing. The first
//! call runs the calibration pass.

use ndarray::Array2;

use super::FrameResult;
use crate::config::StreamConfig;
use crate::error::{Result, SpectrumError};
use crate::normalize::FrameConditioner;
use crate::source::WaveformSource;
use crate::spectrum::{combine_channels_avg, db_conversion, BinSpec, FrameTransform};
use crate::stats::{DistributionEstimator, RunningStats};

/// Lifecycle of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed, calibration not started
    Idle,
    /// Running the calibration pass
    Estimating,
    /// Producing frames
    Streaming,
    /// A terminal error was emitted; nothing further will be produced
    Draining,
    /// Finished, either at end of signal or after an error
    Closed,
}

/// Synchronous spectral analysis of one waveform
pub struct SpectrumPipeline<S: WaveformSource> {
    config: StreamConfig,
    transform: FrameTransform<S>,
    bin_spec: BinSpec,
    estimator: DistributionEstimator,
    stats: RunningStats,
    conditioner: FrameConditioner,

    spectrum: Array2<f64>,
    energies: Array2<f64>,
    combined: Vec<f64>,

    index: usize,
    state: StreamState,
}

impl<S: WaveformSource> SpectrumPipeline<S> {
    /// Validate `config` against `source` and allocate every buffer
    ///
    /// # Arguments
    /// * `source` - Waveform to stream, starting from its first sample
    /// * `config` - Stream settings; rejected here if they cannot run at the source's sample rate
    pub fn new(source: S, config: StreamConfig) -> Result<Self> {
        config.validate()?;

        let sample_rate = source.sample_rate();
        let block_len = config.block_len(sample_rate);
        let hop_len = config.hop_len(sample_rate);
        if hop_len == 0 {
            return Err(SpectrumError::invalid(format!(
                "frame rate {} exceeds sample rate {}",
                config.frame_rate, sample_rate
            )));
        }
        if block_len < 2 {
            return Err(SpectrumError::invalid(format!(
                "{} ms window holds {} samples at {} Hz, need at least 2",
                config.window_ms, block_len, sample_rate
            )));
        }

        if config.pow_two {
            log::info!(
                "Rounded analysis block to {} samples ({:.1} ms)",
                block_len,
                config.effective_window(sample_rate).as_secs_f64() * 1000.0
            );
        }

        let estimator = DistributionEstimator::new(&config, &source);
        let transform = FrameTransform::new(source, block_len, hop_len, config.window)?;
        let bin_spec = BinSpec::build(
            transform.spectrum_len(),
            sample_rate,
            config.bins,
            config.f_min,
            config.f_max,
            config.gamma,
        )?;

        log::info!(
            "Spectrum pipeline: {} Hz, {} channels, {} bins over {:.0}-{:.0} Hz (gamma {}), {} fps",
            sample_rate,
            transform.channels(),
            config.bins,
            config.f_min,
            config.f_max,
            config.gamma,
            config.frame_rate
        );

        let channels = transform.channels();
        Ok(Self {
            spectrum: Array2::zeros((transform.spectrum_len(), channels)),
            energies: Array2::zeros((channels, config.bins)),
            combined: vec![0.0; config.bins],
            conditioner: FrameConditioner::new(&config),
            stats: RunningStats::default(),
            index: 0,
            state: StreamState::Idle,
            config,
            transform,
            bin_spec,
            estimator,
        })
    }

    /// Run the calibration pass; a no-op once it has run
    pub fn calibrate(&mut self) -> Result<()> {
        if self.state != StreamState::Idle {
            return Ok(());
        }

        self.state = StreamState::Estimating;
        match self.estimator.estimate(&mut self.transform, &self.bin_spec) {
            Ok(stats) => {
                self.stats = stats;
                self.state = StreamState::Streaming;
                Ok(())
            }
            Err(e) => {
                log::error!("Calibration failed: {}", e);
                self.state = StreamState::Closed;
                Err(e)
            }
        }
    }

    /// Produce the next frame, `None` once the stream has ended
    pub fn next_frame(&mut self) -> Option<FrameResult> {
        match self.state {
            StreamState::Idle => {
                if let Err(e) = self.calibrate() {
                    return Some(FrameResult {
                        index: self.index,
                        data: Err(e),
                    });
                }
            }
            StreamState::Estimating | StreamState::Streaming => {}
            StreamState::Draining => {
                self.state = StreamState::Closed;
                return None;
            }
            StreamState::Closed => return None,
        }

        if !self.transform.has_next() {
            log::info!(
                "Stream finished after {} frames: mean {:.3} dB, stddev {:.3} dB",
                self.index,
                self.stats.mean(),
                self.stats.stddev()
            );
            self.state = StreamState::Closed;
            return None;
        }

        let index = self.index;
        match self.process_frame() {
            Ok(data) => {
                self.index += 1;
                Some(FrameResult {
                    index,
                    data: Ok(data),
                })
            }
            Err(e) => {
                log::error!("Stream failed at frame {}: {}", index, e);
                self.state = StreamState::Draining;
                Some(FrameResult {
                    index,
                    data: Err(e),
                })
            }
        }
    }

    fn process_frame(&mut self) -> Result<Array2<f64>> {
        self.transform.compute_into(&mut self.spectrum)?;
        self.bin_spec.bin(self.spectrum.view(), &mut self.energies)?;

        // Statistics follow the calibration path: dB of the channel-averaged energy,
        // not the mean of the per-channel dB values
        combine_channels_avg(self.energies.view(), &mut self.combined)?;
        db_conversion(self.combined.iter_mut());
        if !self.estimator.is_calibration_frame(self.index) {
            for &v in &self.combined {
                self.stats.push(v);
            }
        }

        let mut frame = self.energies.clone();
        db_conversion(frame.iter_mut());
        self.conditioner.apply(&mut frame, &self.stats);
        Ok(frame)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Current running level statistics
    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn bin_spec(&self) -> &BinSpec {
        &self.bin_spec
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn transform(&self) -> &FrameTransform<S> {
        &self.transform
    }

    /// Index of the next frame to be produced
    pub fn frame_index(&self) -> usize {
        self.index
    }
}

impl<S: WaveformSource> Iterator for SpectrumPipeline<S> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<FrameResult> {
        self.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, ReadOrder};
    use std::f64::consts::PI;

    fn small_config() -> StreamConfig {
        StreamConfig {
            bins: 16,
            f_min: 40.0,
            f_max: 3800.0,
            gamma: 1.5,
            window_ms: 32.0,
            frame_rate: 50,
            estimate_burst_ms: 100.0,
            estimate_stride_ms: 400.0,
            ..StreamConfig::default()
        }
    }

    fn chirp(seconds: f64, sample_rate: u32) -> Vec<f64> {
        let frames = (seconds * sample_rate as f64) as usize;
        (0..frames)
            .map(|n| {
                let t = n as f64 / sample_rate as f64;
                0.5 * (2.0 * PI * (200.0 + 300.0 * t) * t).sin()
            })
            .collect()
    }

    /// Source that starts failing reads after a fixed number of calls
    struct FlakySource {
        inner: MemorySource,
        reads_left: usize,
        seek_fails: bool,
    }

    impl FlakySource {
        fn failing_reads(inner: MemorySource, reads_left: usize) -> Self {
            Self {
                inner,
                reads_left,
                seek_fails: false,
            }
        }

        fn failing_seeks(inner: MemorySource) -> Self {
            Self {
                inner,
                reads_left: usize::MAX,
                seek_fails: true,
            }
        }
    }

    impl WaveformSource for FlakySource {
        fn channels(&self) -> usize {
            self.inner.channels()
        }
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }
        fn bit_depth(&self) -> u16 {
            self.inner.bit_depth()
        }
        fn frames(&self) -> usize {
            self.inner.frames()
        }
        fn has(&self, n: usize) -> bool {
            self.inner.has(n)
        }
        fn seek(&mut self, offset: i64) -> Result<()> {
            if self.seek_fails {
                return Err(SpectrumError::SeekOutOfRange {
                    position: self.inner.position(),
                    offset,
                    frames: self.inner.frames(),
                });
            }
            self.inner.seek(offset)
        }
        fn reset(&mut self) -> Result<()> {
            self.inner.reset()
        }
        fn read_samples(&mut self, to: &mut Array2<f64>, order: ReadOrder) -> Result<usize> {
            if self.reads_left == 0 {
                return Err(SpectrumError::ShortRead {
                    requested: to.len(),
                    available: 0,
                });
            }
            self.reads_left -= 1;
            self.inner.read_samples(to, order)
        }
    }

    #[test]
    fn test_state_machine_runs_to_close() {
        let source = MemorySource::from_channels(&[chirp(2.0, 8000)], 8000).unwrap();
        let mut pipeline = SpectrumPipeline::new(source, small_config()).unwrap();
        assert_eq!(pipeline.state(), StreamState::Idle);

        let first = pipeline.next_frame().unwrap();
        assert_eq!(pipeline.state(), StreamState::Streaming);
        assert_eq!(first.index, 0);
        assert_eq!(first.data.unwrap().dim(), (1, 16));

        let rest: Vec<FrameResult> = pipeline.by_ref().collect();
        assert_eq!(pipeline.state(), StreamState::Closed);
        assert!(pipeline.next_frame().is_none());

        // 256-sample blocks, 160-sample hops over 16000 samples
        assert_eq!(rest.len() + 1, (16000 - 256) / 160 + 1);
        for (i, frame) in rest.iter().enumerate() {
            assert_eq!(frame.index, i + 1);
            assert!(frame.data.is_ok());
        }
    }

    #[test]
    fn test_statistics_keep_updating() {
        let source = MemorySource::from_channels(&[chirp(2.0, 8000)], 8000).unwrap();
        let mut pipeline = SpectrumPipeline::new(source, small_config()).unwrap();

        pipeline.calibrate().unwrap();
        let seeded = pipeline.stats().count();
        assert!(seeded > 0);

        // Frames 0..=5 overlap the first burst and do not count again
        for _ in 0..6 {
            pipeline.next_frame().unwrap().data.unwrap();
        }
        assert_eq!(pipeline.stats().count(), seeded);

        pipeline.next_frame().unwrap().data.unwrap();
        assert!(pipeline.stats().count() > seeded);
    }

    #[test]
    fn test_mid_stream_failure_is_terminal() {
        let inner = MemorySource::from_channels(&[chirp(2.0, 8000)], 8000).unwrap();
        // One read per calibration frame (5 bursts of 5 frames), then three streaming frames
        let source = FlakySource::failing_reads(inner, 25 + 3);
        let mut pipeline = SpectrumPipeline::new(source, small_config()).unwrap();

        let results: Vec<FrameResult> = pipeline.by_ref().collect();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(|r| r.data.is_ok()));
        assert_eq!(results[3].index, 3);
        assert!(matches!(results[3].data, Err(SpectrumError::ShortRead { .. })));
        assert_eq!(pipeline.state(), StreamState::Closed);
    }

    #[test]
    fn test_calibration_failure_closes() {
        let inner = MemorySource::from_channels(&[chirp(2.0, 8000)], 8000).unwrap();
        let source = FlakySource::failing_reads(inner, 2);
        let mut pipeline = SpectrumPipeline::new(source, small_config()).unwrap();

        let result = pipeline.next_frame().unwrap();
        assert!(result.data.is_err());
        assert_eq!(pipeline.state(), StreamState::Closed);
        assert!(pipeline.next_frame().is_none());
    }

    #[test]
    fn test_invalid_configuration_detected_up_front() {
        let source = MemorySource::from_channels(&[chirp(0.5, 8000)], 8000).unwrap();
        let config = StreamConfig {
            f_max: 10.0,
            ..small_config()
        };
        assert!(matches!(
            SpectrumPipeline::new(source.clone(), config),
            Err(SpectrumError::InvalidConfiguration(_))
        ));

        let config = StreamConfig {
            frame_rate: 10000,
            estimate_burst_ms: 1.0,
            estimate_stride_ms: 2.0,
            ..small_config()
        };
        assert!(SpectrumPipeline::new(source.clone(), config).is_err());

        // 0.1 ms at 8 kHz rounds down to a zero-sample block
        let config = StreamConfig {
            window_ms: 0.1,
            ..small_config()
        };
        assert!(matches!(
            SpectrumPipeline::new(source, config),
            Err(SpectrumError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_seek_failure_during_calibration_is_fatal() {
        let inner = MemorySource::from_channels(&[chirp(2.0, 8000)], 8000).unwrap();
        let mut pipeline = SpectrumPipeline::new(FlakySource::failing_seeks(inner), small_config()).unwrap();

        // The first burst reads fine; moving to the second burst needs a seek
        let result = pipeline.next_frame().unwrap();
        assert_eq!(result.index, 0);
        assert!(matches!(result.data, Err(SpectrumError::SeekOutOfRange { .. })));
        assert_eq!(pipeline.state(), StreamState::Closed);
        assert!(pipeline.next_frame().is_none());
    }
}
