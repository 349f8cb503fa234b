//! Mel-frequency cepstral coefficients
//!
//! **Algorithm:**
//! 1. Power spectrogram through a Slaney-style mel filterbank
//!    (area-normalised triangles, linear below 1 kHz, logarithmic above)
//! 2. Convert to dB with an 80 dB floor below the clip's maximum
//! 3. Orthonormal DCT-II over the mel axis, keep the first coefficients

use std::f64::consts::PI;

use super::spectrogram::{fft_frequencies, power_to_db};
use super::{N_MELS, N_MFCC};

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz → mel (Slaney scale)
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Mel → Hz (Slaney scale)
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// One triangular filter, stored as its non-zero span
#[derive(Debug, Clone)]
struct MelFilter {
    first_bin: usize,
    weights: Vec<f64>,
}

impl MelFilter {
    fn apply(&self, frame: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(&frame[self.first_bin..])
            .map(|(w, p)| w * p)
            .sum()
    }
}

/// MFCC analyzer with pre-computed filterbank and DCT basis
pub struct MfccAnalyzer {
    filters: Vec<MelFilter>,
    dct_basis: Vec<Vec<f64>>,
}

impl MfccAnalyzer {
    /// Build for a given rate and FFT size, covering 0 Hz to Nyquist
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        Self {
            filters: mel_filterbank(sample_rate, n_fft, N_MELS, 0.0, sample_rate as f64 / 2.0),
            dct_basis: dct_ortho_basis(N_MFCC, N_MELS),
        }
    }

    /// Per-frame cepstral coefficients
    pub fn compute(&self, power: &[Vec<f64>]) -> Vec<[f64; N_MFCC]> {
        let mut mel_db = Vec::with_capacity(power.len() * N_MELS);
        for frame in power {
            mel_db.extend(self.filters.iter().map(|f| f.apply(frame)));
        }

        power_to_db(&mut mel_db);

        mel_db
            .chunks(N_MELS)
            .map(|mel| {
                let mut coeffs = [0.0; N_MFCC];
                for (c, basis) in coeffs.iter_mut().zip(&self.dct_basis) {
                    *c = basis.iter().zip(mel).map(|(b, m)| b * m).sum();
                }
                coeffs
            })
            .collect()
    }
}

/// Slaney-normalised mel filterbank
fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Vec<MelFilter> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|i| {
            let (left, center, right) = (mel_f[i], mel_f[i + 1], mel_f[i + 2]);
            let enorm = 2.0 / (right - left);

            let dense: Vec<f64> = fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect();

            let first_bin = dense.iter().position(|&w| w > 0.0).unwrap_or(0);
            let last_bin = dense.iter().rposition(|&w| w > 0.0).unwrap_or(0);
            let weights = if last_bin >= first_bin && dense[first_bin] > 0.0 {
                dense[first_bin..=last_bin].to_vec()
            } else {
                Vec::new()
            };

            MelFilter { first_bin, weights }
        })
        .collect()
}

/// Rows `k` of the orthonormal DCT-II matrix for `n` inputs
fn dct_ortho_basis(n_coeffs: usize, n: usize) -> Vec<Vec<f64>> {
    (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
            };
            (0..n)
                .map(|i| scale * (PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64).cos())
                .collect()
        })
        .collect()
}
