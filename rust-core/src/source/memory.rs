//! In-memory waveform source
//!
//! Holds the decoded signal as a `[frames × channels]` array with a cursor.

use ndarray::{s, Array2};
use std::io::Read;
use std::path::Path;

use super::{ReadOrder, WaveformSource};
use crate::error::{Result, SpectrumError};

/// Decoded waveform held entirely in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    /// Samples, `[frames × channels]`, amplitude in [-1, 1]
    data: Array2<f64>,
    sample_rate: u32,
    bit_depth: u16,
    position: usize,
}

impl MemorySource {
    /// Wrap a `[frames × channels]` sample array
    pub fn new(data: Array2<f64>, sample_rate: u32, bit_depth: u16) -> Result<Self> {
        if data.ncols() == 0 {
            return Err(SpectrumError::invalid("waveform must have at least one channel"));
        }
        if sample_rate == 0 {
            return Err(SpectrumError::invalid("sample rate must be positive"));
        }

        Ok(Self {
            data,
            sample_rate,
            bit_depth,
            position: 0,
        })
    }

    /// Build a source from one sample vector per channel (equal lengths)
    pub fn from_channels(channels: &[Vec<f64>], sample_rate: u32) -> Result<Self> {
        let frames = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|ch| ch.len() != frames) {
            return Err(SpectrumError::invalid("channels must have equal lengths"));
        }

        let data = Array2::from_shape_fn((frames, channels.len()), |(i, c)| channels[c][i]);
        Self::new(data, sample_rate, 64)
    }

    /// Decode a WAV file into memory
    pub fn open_wav(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)?;
        let source = Self::from_wav_reader(reader)?;

        log::info!(
            "Loaded {}: {} channels, {} Hz, {} bit, {:.1}s",
            path.display(),
            source.channels(),
            source.sample_rate,
            source.bit_depth,
            source.duration().as_secs_f64()
        );

        Ok(source)
    }

    /// Decode every sample from an open WAV reader
    pub fn from_wav_reader<R: Read>(reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let channels = spec.channels as usize;

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<std::result::Result<_, _>>()?,
        };

        if channels == 0 {
            return Err(SpectrumError::invalid("WAV header declares zero channels"));
        }

        // A trailing partial frame is dropped
        let frames = interleaved.len() / channels;
        let mut interleaved = interleaved;
        interleaved.truncate(frames * channels);
        let data = Array2::from_shape_vec((frames, channels), interleaved)
            .map_err(|e| SpectrumError::invalid(e.to_string()))?;

        Self::new(data, spec.sample_rate, spec.bits_per_sample)
    }

    /// Current cursor position in samples
    pub fn position(&self) -> usize {
        self.position
    }

    fn remaining(&self) -> usize {
        self.data.nrows() - self.position
    }
}

impl WaveformSource for MemorySource {
    fn channels(&self) -> usize {
        self.data.ncols()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    fn frames(&self) -> usize {
        self.data.nrows()
    }

    fn has(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    fn seek(&mut self, offset: i64) -> Result<()> {
        let target = self.position as i64 + offset;
        if target < 0 || target > self.frames() as i64 {
            return Err(SpectrumError::SeekOutOfRange {
                position: self.position,
                offset,
                frames: self.frames(),
            });
        }

        self.position = target as usize;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn read_samples(&mut self, to: &mut Array2<f64>, order: ReadOrder) -> Result<usize> {
        let channels = self.channels();
        let (n, shape_ok) = match order {
            ReadOrder::SampleMajor => (to.nrows(), to.ncols() == channels),
            ReadOrder::ChannelMajor => (to.ncols(), to.nrows() == channels),
        };

        if !shape_ok {
            return Err(SpectrumError::invalid(format!(
                "read buffer of shape {:?} does not match {} channels",
                to.dim(),
                channels
            )));
        }

        if n > self.remaining() {
            return Err(SpectrumError::ShortRead {
                requested: n,
                available: self.remaining(),
            });
        }

        let block = self.data.slice(s![self.position..self.position + n, ..]);
        match order {
            ReadOrder::SampleMajor => to.assign(&block),
            ReadOrder::ChannelMajor => to.assign(&block.t()),
        }

        self.position += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ramp_source() -> MemorySource {
        let left: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        let right: Vec<f64> = left.iter().map(|v| -v).collect();
        MemorySource::from_channels(&[left, right], 1000).unwrap()
    }

    #[test]
    fn test_read_orders() {
        let mut source = ramp_source();

        let mut by_sample = Array2::zeros((3, 2));
        source.read_samples(&mut by_sample, ReadOrder::SampleMajor).unwrap();
        assert_eq!(by_sample[[2, 0]], 0.2);
        assert_eq!(by_sample[[2, 1]], -0.2);

        let mut by_channel = Array2::zeros((2, 3));
        source.read_samples(&mut by_channel, ReadOrder::ChannelMajor).unwrap();
        assert_eq!(by_channel[[0, 0]], 0.3);
        assert_eq!(by_channel[[1, 2]], -0.5);
        assert_eq!(source.position(), 6);
    }

    #[test]
    fn test_short_read_keeps_cursor() {
        let mut source = ramp_source();
        source.seek(8).unwrap();

        let mut buf = Array2::zeros((4, 2));
        let err = source.read_samples(&mut buf, ReadOrder::SampleMajor).unwrap_err();
        assert!(matches!(err, SpectrumError::ShortRead { requested: 4, available: 2 }));
        assert_eq!(source.position(), 8);
        assert!(source.has(2));
        assert!(!source.has(3));
    }

    #[test]
    fn test_seek_bounds() {
        let mut source = ramp_source();
        assert!(source.seek(10).is_ok());
        assert!(matches!(
            source.seek(1),
            Err(SpectrumError::SeekOutOfRange { position: 10, offset: 1, frames: 10 })
        ));
        assert!(source.seek(-10).is_ok());
        assert!(source.seek(-1).is_err());

        source.seek(5).unwrap();
        source.reset().unwrap();
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn test_wrong_buffer_shape() {
        let mut source = ramp_source();
        let mut buf = Array2::zeros((4, 3));
        assert!(matches!(
            source.read_samples(&mut buf, ReadOrder::SampleMajor),
            Err(SpectrumError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_decode_wav() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..100 {
                writer.write_sample(i as i16 * 100).unwrap();
                writer.write_sample(-16384_i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.set_position(0);

        let source = MemorySource::from_wav_reader(hound::WavReader::new(cursor).unwrap()).unwrap();
        assert_eq!(source.channels(), 2);
        assert_eq!(source.frames(), 100);
        assert_eq!(source.sample_rate(), 8000);
        assert_eq!(source.bit_depth(), 16);
        assert!((source.data[[10, 0]] - 1000.0 / 32768.0).abs() < 1e-12);
        assert_eq!(source.data[[10, 1]], -0.5);
    }
}
