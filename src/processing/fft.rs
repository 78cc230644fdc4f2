//! FFT computation using rustfft
//!
//! Windowed, detrended one-sided energy spectra for order analysis.
//!
//! # Features
//!
//! - Pre-planned FFT reused across every window of a spectrogram
//! - Periodic Hann taper with coherent-gain amplitude correction
//! - Least-squares linear detrend
//!
//! A sinusoid of amplitude `A` that falls exactly on bin `k` yields energy
//! `A²` in that bin.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{AnalysisError, AnalysisResult};

// ============================================================================
// Window / Detrend
// ============================================================================

/// Periodic Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    use std::f64::consts::PI;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Remove the least-squares straight line from `segment`.
pub fn detrend_linear(segment: &[f64]) -> Vec<f64> {
    let n = segment.len();
    if n < 2 {
        return segment.iter().map(|_| 0.0).collect();
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = segment.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in segment.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    segment
        .iter()
        .enumerate()
        .map(|(i, &y)| y - (y_mean + slope * (i as f64 - x_mean)))
        .collect()
}

// ============================================================================
// FFT Processor (Pre-planned for repeated use)
// ============================================================================

/// FFT processor with a pre-planned transform and a cached taper.
///
/// Segments of `input_len` samples are zero-padded to the next power of two.
pub struct FftProcessor {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
    input_len: usize,
    window: Vec<f64>,
    window_sum: f64,
}

impl FftProcessor {
    /// Create a processor for segments of `input_len` samples.
    pub fn new(input_len: usize) -> AnalysisResult<Self> {
        if input_len < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "FFT segment length must be >= 2, got {input_len}"
            )));
        }

        let size = input_len.next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let window = hann_window(input_len);
        let window_sum = window.iter().sum();

        Ok(Self {
            fft,
            size,
            input_len,
            window,
            window_sum,
        })
    }

    /// One-sided energy spectrum (`size / 2 + 1` bins) of a detrended,
    /// Hann-tapered segment.
    pub fn energy_spectrum(&self, segment: &[f64]) -> AnalysisResult<Vec<f64>> {
        if segment.len() != self.input_len {
            return Err(AnalysisError::InsufficientData {
                needed: self.input_len,
                available: segment.len(),
            });
        }

        let detrended = detrend_linear(segment);
        let mut buffer: Vec<Complex<f64>> = detrended
            .iter()
            .zip(&self.window)
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        buffer.resize(self.size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        // 2/Σw for one-sided amplitude, except DC and Nyquist
        let n_positive = self.size / 2 + 1;
        let energies = buffer
            .iter()
            .take(n_positive)
            .enumerate()
            .map(|(i, c)| {
                let scale = if i == 0 || i == n_positive - 1 { 1.0 } else { 2.0 };
                let amplitude = c.norm() * scale / self.window_sum;
                amplitude * amplitude
            })
            .collect();

        Ok(energies)
    }

    /// Transform size after zero-padding
    pub fn size(&self) -> usize {
        self.size
    }

    /// Segment length accepted by [`Self::energy_spectrum`]
    pub fn input_len(&self) -> usize {
        self.input_len
    }
}

// ============================================================================
// Tests
// ============================================================================
