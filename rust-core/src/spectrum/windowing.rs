//! Windowing functions for spectral analysis
//!
//! Every analysis block is tapered before the FFT to reduce spectral leakage

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    Blackman,

    /// Blackman-Nuttall window, four-term with ~98 dB sidelobe attenuation
    BlackmanNuttall,

    /// Rectangular window (no windowing)
    Rectangular,
}

/// Weight of sample `n` in a block of `length` samples
pub fn window_weight(window_type: WindowType, n: usize, length: usize) -> f64 {
    if length < 2 {
        return 1.0;
    }

    let angle = 2.0 * PI * n as f64 / (length as f64 - 1.0);

    match window_type {
        WindowType::Hann => 0.5 - 0.5 * angle.cos(),

        WindowType::Hamming => 0.54 - 0.46 * angle.cos(),

        WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),

        WindowType::BlackmanNuttall => {
            const A0: f64 = 0.3635819;
            const A1: f64 = 0.4891775;
            const A2: f64 = 0.1365995;
            const A3: f64 = 0.0106411;

            A0 - A1 * angle.cos() + A2 * (2.0 * angle).cos() - A3 * (3.0 * angle).cos()
        }

        WindowType::Rectangular => 1.0,
    }
}

/// Generate window coefficients w[n] for n = 0..length-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    (0..length)
        .map(|n| window_weight(window_type, n, length))
        .collect()
}

/// Apply window in-place
pub fn apply_window_inplace(signal: &mut [f64], window: &[f64]) {
    for (s, w) in signal.iter_mut().zip(window.iter()) {
        *s *= w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_generation() {
        let length = 161;

        for window_type in [
            WindowType::Hann,
            WindowType::Hamming,
            WindowType::Blackman,
            WindowType::BlackmanNuttall,
        ] {
            let window = generate_window(window_type, length);
            assert_eq!(window.len(), length);

            // Symmetric
            assert!((window[0] - window[length - 1]).abs() < 1e-10);
            assert!((window[20] - window[length - 21]).abs() < 1e-10);

            // Peak of 1.0 at the centre
            assert!((window[length / 2] - 1.0).abs() < 1e-6, "{:?}", window_type);
        }

        // Hamming keeps non-zero endpoints (0.08)
        let hamming = generate_window(WindowType::Hamming, length);
        assert!(hamming[0] > 0.07 && hamming[0] < 0.09);

        // Blackman-Nuttall edges are almost zero
        let nuttall = generate_window(WindowType::BlackmanNuttall, length);
        assert!(nuttall[0] < 1e-3);
    }

    #[test]
    fn test_rectangular_window() {
        let window = generate_window(WindowType::Rectangular, 100);
        assert_eq!(window.len(), 100);
        assert!(window.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_apply_window() {
        let mut signal = vec![1.0; 100];
        apply_window_inplace(&mut signal, &generate_window(WindowType::Hann, 100));

        assert_eq!(signal[0], 0.0);
        assert!(signal[50] > 0.99);
    }
}
