//! Streaming frame production
//!
//! [`SpectrumPipeline`] is the synchronous core. [`SpectrumStream`] runs a pipeline
//! on its own thread and hands frames over a bounded queue, so a slow consumer
//! stalls the producer instead of growing memory. [`FramePacer`] releases queued
//! frames at the configured frame rate.

pub mod pacer;
pub mod pipeline;

pub use pacer::{pre_roll_frames, FramePacer};
pub use pipeline::{SpectrumPipeline, StreamState};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use ndarray::Array2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::SpectrumError;
use crate::source::WaveformSource;
use crate::stats::RunningStats;

/// One output frame, or the error that ended the stream
#[derive(Debug)]
pub struct FrameResult {
    /// Zero-based position in the stream
    pub index: usize,
    /// `[channels × bins]` normalized levels
    pub data: Result<Array2<f64>, SpectrumError>,
}

impl FrameResult {
    pub fn is_error(&self) -> bool {
        self.data.is_err()
    }
}

/// Pipeline running on a background producer thread
pub struct SpectrumStream {
    frames: Receiver<FrameResult>,
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<RunningStats>>,
    frame_period: Duration,
    capacity: usize,
}

impl SpectrumStream {
    /// Start producing with a queue holding ten seconds of frames
    pub fn spawn<S: WaveformSource + 'static>(pipeline: SpectrumPipeline<S>) -> crate::Result<Self> {
        let capacity = pipeline.config().queue_capacity();
        Self::spawn_with_capacity(pipeline, capacity)
    }

    /// Start producing into a queue of `capacity` frames
    ///
    /// # Arguments
    /// * `pipeline` - Pipeline to run; calibrates on the producer thread if needed
    /// * `capacity` - Frames buffered before the producer blocks (at least 1)
    ///
    /// # Returns
    /// The running stream, or `Io` if the thread could not be spawned
    pub fn spawn_with_capacity<S: WaveformSource + 'static>(
        pipeline: SpectrumPipeline<S>,
        capacity: usize,
    ) -> crate::Result<Self> {
        let capacity = capacity.max(1);
        let frame_period = pipeline.config().frame_period();
        let (tx, rx) = bounded(capacity);
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let producer = std::thread::Builder::new()
            .name("spectrum-producer".into())
            .spawn(move || produce(pipeline, tx, flag))?;

        log::debug!("Spectrum producer started, queue capacity {}", capacity);

        Ok(Self {
            frames: rx,
            running,
            producer: Some(producer),
            frame_period,
            capacity,
        })
    }

    /// Block until the next frame; `None` once the stream has ended
    pub fn recv(&self) -> Option<FrameResult> {
        self.frames.recv().ok()
    }

    /// Next frame if one is already queued
    pub fn try_recv(&self) -> Option<FrameResult> {
        match self.frames.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Frames currently waiting in the queue
    pub fn queued(&self) -> usize {
        self.frames.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// True once the producer thread has exited
    pub fn is_finished(&self) -> bool {
        self.producer.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Consumer that releases one frame per tick of the frame clock
    pub fn paced(&self) -> FramePacer {
        FramePacer::new(self.frames.clone(), self.frame_period)
    }

    /// Stop the producer and wait for it; returns its final statistics.
    ///
    /// Frames still queued are discarded. Returns `None` if the stream was
    /// already stopped or the producer panicked.
    pub fn stop(&mut self) -> Option<RunningStats> {
        let producer = self.producer.take()?;
        self.running.store(false, Ordering::SeqCst);

        // Unblock a producer waiting on a full queue
        while self.frames.recv().is_ok() {}

        match producer.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                log::error!("Spectrum producer thread panicked");
                None
            }
        }
    }
}

impl Iterator for SpectrumStream {
    type Item = FrameResult;

    fn next(&mut self) -> Option<FrameResult> {
        self.recv()
    }
}

impl Drop for SpectrumStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce<S: WaveformSource>(
    mut pipeline: SpectrumPipeline<S>,
    frames: Sender<FrameResult>,
    running: Arc<AtomicBool>,
) -> RunningStats {
    while running.load(Ordering::SeqCst) {
        let result = match pipeline.next_frame() {
            Some(result) => result,
            None => break,
        };

        let index = result.index;
        if frames.send(result).is_err() {
            log::warn!("Frame consumer disconnected, stopping at frame {}", index);
            break;
        }
    }

    log::debug!(
        "Spectrum producer exiting in state {:?} after {} frames",
        pipeline.state(),
        pipeline.frame_index()
    );
    *pipeline.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::source::MemorySource;

    fn pipeline(seconds: f64) -> SpectrumPipeline<MemorySource> {
        let sample_rate = 8000;
        let frames = (seconds * sample_rate as f64) as usize;
        let signal: Vec<f64> = (0..frames)
            .map(|n| (n as f64 * 0.2).sin() * 0.3 + (n as f64 * 0.05).cos() * 0.1)
            .collect();
        let source = MemorySource::from_channels(&[signal], sample_rate).unwrap();
        let config = StreamConfig {
            bins: 8,
            f_min: 50.0,
            f_max: 3500.0,
            window_ms: 32.0,
            frame_rate: 50,
            estimate_burst_ms: 100.0,
            estimate_stride_ms: 500.0,
            ..StreamConfig::default()
        };
        SpectrumPipeline::new(source, config).unwrap()
    }

    #[test]
    fn test_stream_matches_synchronous_pipeline() {
        let expected: Vec<Array2<f64>> = pipeline(1.0).map(|r| r.data.unwrap()).collect();

        let stream = SpectrumStream::spawn(pipeline(1.0)).unwrap();
        assert_eq!(stream.capacity(), 500);

        let received: Vec<FrameResult> = stream.collect();
        assert_eq!(received.len(), expected.len());
        for (i, (frame, want)) in received.iter().zip(expected.iter()).enumerate() {
            assert_eq!(frame.index, i);
            let got = frame.data.as_ref().unwrap();
            for (a, b) in got.iter().zip(want.iter()) {
                assert!((a == b) || (a.is_nan() && b.is_nan()));
            }
        }
    }

    #[test]
    fn test_stop_returns_statistics() {
        let mut stream = SpectrumStream::spawn_with_capacity(pipeline(2.0), 4).unwrap();
        let first = stream.recv().unwrap();
        assert_eq!(first.index, 0);

        let stats = stream.stop().unwrap();
        assert!(stats.count() > 0);
        assert!(stream.is_finished());
        assert!(stream.recv().is_none());
        assert!(stream.stop().is_none());
    }

    #[test]
    fn test_empty_queue_try_recv() {
        let mut stream = SpectrumStream::spawn_with_capacity(pipeline(0.5), 2).unwrap();
        stream.stop();
        assert!(stream.try_recv().is_none());
        assert_eq!(stream.queued(), 0);
    }
}
