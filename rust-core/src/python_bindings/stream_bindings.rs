//! Python bindings for the spectrum stream

use numpy::{PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

use crate::config::StreamConfig;
use crate::source::{MemorySource, WaveformSource};
use crate::stats::RunningStats;
use crate::stream::{pre_roll_frames, FramePacer, FrameResult, SpectrumPipeline, SpectrumStream};

/// Background spectrum stream exposed to Python
///
/// Frames are `[channels × bins]` arrays of normalized levels. Iterating yields
/// frames as fast as they are produced; `next_paced_frame` releases them at the
/// configured frame rate.
#[pyclass(name = "SpectrumStream")]
pub struct PySpectrumStream {
    stream: SpectrumStream,
    pacer: FramePacer,
    bin_ranges: Vec<Option<(f64, f64)>>,
    channels: usize,
    sample_rate: u32,
    frame_rate: u32,
    pre_roll: usize,
    calibration: RunningStats,
}

impl PySpectrumStream {
    fn start(source: MemorySource, config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(text) => StreamConfig::from_toml_str(text)?,
            None => StreamConfig::default(),
        };

        let channels = source.channels();
        let sample_rate = source.sample_rate();
        let frame_rate = config.frame_rate;
        let pre_roll = pre_roll_frames(config.effective_window(sample_rate), config.frame_period());

        let mut pipeline = SpectrumPipeline::new(source, config)?;
        pipeline.calibrate()?;

        let spec = pipeline.bin_spec();
        let bin_ranges = (0..spec.bins()).map(|i| spec.frequency_range(i)).collect();
        let calibration = *pipeline.stats();

        let stream = SpectrumStream::spawn(pipeline)?;
        let pacer = stream.paced();

        Ok(Self {
            stream,
            pacer,
            bin_ranges,
            channels,
            sample_rate,
            frame_rate,
            pre_roll,
            calibration,
        })
    }

    fn unpack<'py>(py: Python<'py>, frame: Option<FrameResult>) -> PyResult<Option<&'py PyArray2<f64>>> {
        match frame {
            Some(FrameResult { data, .. }) => Ok(Some(PyArray2::from_owned_array(py, data?))),
            None => Ok(None),
        }
    }
}

#[pymethods]
impl PySpectrumStream {
    /// Stream a WAV file
    ///
    /// Args:
    ///     path: Path to a PCM or float WAV file
    ///     config: Optional TOML text overriding stream settings
    #[staticmethod]
    #[pyo3(signature = (path, config=None))]
    fn from_wav(path: &str, config: Option<&str>) -> PyResult<Self> {
        Self::start(MemorySource::open_wav(path)?, config)
    }

    /// Stream an in-memory signal
    ///
    /// Args:
    ///     samples: `[frames × channels]` float array
    ///     sample_rate: Sample rate in Hz
    ///     config: Optional TOML text overriding stream settings
    #[staticmethod]
    #[pyo3(signature = (samples, sample_rate, config=None))]
    fn from_array(samples: PyReadonlyArray2<f64>, sample_rate: u32, config: Option<&str>) -> PyResult<Self> {
        let source = MemorySource::new(samples.as_array().to_owned(), sample_rate, 64)?;
        Self::start(source, config)
    }

    /// Next frame as soon as it is available, or None at the end of the stream
    fn next_frame<'py>(&self, py: Python<'py>) -> PyResult<Option<&'py PyArray2<f64>>> {
        let stream = &self.stream;
        let frame = py.allow_threads(move || stream.recv());
        Self::unpack(py, frame)
    }

    /// Next frame, released on the frame clock
    fn next_paced_frame<'py>(&self, py: Python<'py>) -> PyResult<Option<&'py PyArray2<f64>>> {
        let pacer = &self.pacer;
        let frame = py.allow_threads(move || pacer.next_frame());
        Self::unpack(py, frame)
    }

    fn __iter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __next__<'py>(&self, py: Python<'py>) -> PyResult<Option<&'py PyArray2<f64>>> {
        self.next_frame(py)
    }

    /// Stop producing and return the final (mean, stddev, count) level statistics
    fn stop(&mut self, py: Python<'_>) -> Option<(f64, f64, u64)> {
        let stream = &mut self.stream;
        py.allow_threads(move || stream.stop())
            .map(|stats| (stats.mean(), stats.stddev(), stats.count()))
    }

    /// (low Hz, high Hz) covered by each bin; None for bins without FFT bins
    fn bin_ranges(&self) -> Vec<Option<(f64, f64)>> {
        self.bin_ranges.clone()
    }

    #[getter]
    fn channels(&self) -> usize {
        self.channels
    }

    #[getter]
    fn bins(&self) -> usize {
        self.bin_ranges.len()
    }

    #[getter]
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[getter]
    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Frames by which audio playback should start ahead of display
    #[getter]
    fn pre_roll_frames(&self) -> usize {
        self.pre_roll
    }

    /// Mean level (dB) found by the calibration pass
    #[getter]
    fn calibration_mean(&self) -> f64 {
        self.calibration.mean()
    }

    /// Level standard deviation (dB) found by the calibration pass
    #[getter]
    fn calibration_stddev(&self) -> f64 {
        self.calibration.stddev()
    }
}
