use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use spectral_stream::spectrum::FftEngine;
use spectral_stream::{BinSpec, MemorySource, SpectrumPipeline, StreamConfig};

fn test_signal(frames: usize) -> Vec<f64> {
    (0..frames)
        .map(|n| {
            let t = n as f64 / 44100.0;
            0.5 * (2.0 * std::f64::consts::PI * 440.0 * t).sin() + 0.1 * (t * 7919.0).sin()
        })
        .collect()
}

fn bench_fft(c: &mut Criterion) {
    let signal = test_signal(8192);
    let mut engine = FftEngine::new(8192);
    c.bench_function("fft_magnitude_8192", |b| {
        b.iter(|| engine.compute_magnitude(black_box(&signal)))
    });
}

fn bench_binning(c: &mut Criterion) {
    let config = StreamConfig::default();
    let spec = BinSpec::build(4097, 44100, config.bins, config.f_min, config.f_max, config.gamma)
        .expect("default bins");
    let spectrum = Array2::from_shape_fn((4097, 2), |(i, c)| (i + c) as f64 * 1e-3);
    let mut out = Array2::zeros((2, config.bins));
    c.bench_function("bin_4097_stereo", |b| {
        b.iter(|| spec.bin(black_box(spectrum.view()), &mut out))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let signal = test_signal(44100 * 3);
    let source =
        MemorySource::from_channels(&[signal.clone(), signal], 44100).expect("equal channels");
    c.bench_function("pipeline_3s_stereo", |b| {
        b.iter(|| {
            let pipeline = SpectrumPipeline::new(source.clone(), StreamConfig::default())
                .expect("default config");
            black_box(pipeline.count())
        })
    });
}

criterion_group!(benches, bench_fft, bench_binning, bench_pipeline);
criterion_main!(benches);
