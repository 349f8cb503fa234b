//! Short-time Fourier analysis
//!
//! Centered frames (zero padding of `n_fft / 2` on both sides), periodic
//! Hann window, one-sided power spectrum per frame.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Smallest power considered when converting to decibels
pub const AMIN: f64 = 1e-10;

/// Dynamic range kept below the matrix maximum, in dB
pub const TOP_DB: f64 = 80.0;

/// Power spectrogram: one row of `n_fft / 2 + 1` bins per analysis frame
pub type PowerSpectrogram = Vec<Vec<f64>>;

/// STFT processor with a pre-planned FFT
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);

        Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            fft,
        }
    }

    /// Number of frequency bins per frame
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of centered frames for a signal of `n_samples`
    pub fn frame_count(&self, n_samples: usize) -> usize {
        if n_samples == 0 {
            0
        } else {
            1 + n_samples / self.hop_length
        }
    }

    /// Compute `|STFT|^2`
    pub fn power_spectrogram(&self, samples: &[f64]) -> PowerSpectrogram {
        let n_frames = self.frame_count(samples.len());
        let pad = (self.n_fft / 2) as isize;
        let n_bins = self.n_bins();

        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        let mut frames = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let start = (t * self.hop_length) as isize - pad;

            for (j, slot) in buffer.iter_mut().enumerate() {
                let idx = start + j as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[j], 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            frames.push(buffer[..n_bins].iter().map(|c| c.norm_sqr()).collect());
        }

        frames
    }
}

/// Periodic Hann window (DFT-even)
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

/// Center frequency of each one-sided FFT bin
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Convert a power (or magnitude) matrix to decibels in place
///
/// `10 * log10(max(AMIN, x))` relative to 1.0, then floored at
/// `max - TOP_DB` over the whole matrix.
pub fn power_to_db(values: &mut [f64]) {
    let mut max_db = f64::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }

    let floor = max_db - TOP_DB;
    for v in values.iter_mut() {
        *v = v.max(floor);
    }
}
