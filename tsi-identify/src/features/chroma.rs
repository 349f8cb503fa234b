//! Chroma energy from the power spectrogram
//!
//! Each FFT bin is spread over the 12 pitch classes with a Gaussian bump
//! around its (fractional) pitch class, weighted towards the middle of the
//! audible range, then each frame is scaled so its strongest class is 1.
//!
//! The reference pitch is corrected by a tuning offset estimated from
//! spectral peaks, so slightly detuned recordings land in the right class.

use super::spectrogram::fft_frequencies;
use super::N_CHROMA;

/// Center of the octave weighting, in octaves above A0 (27.5 Hz)
const CENTER_OCTAVE: f64 = 5.0;

/// Width (standard deviation) of the octave weighting, in octaves
const OCTAVE_WIDTH: f64 = 2.0;

/// Peak search range for tuning estimation
const TUNING_FMIN: f64 = 150.0;
const TUNING_FMAX: f64 = 4000.0;

/// Peaks below this fraction of the frame maximum are ignored
const TUNING_THRESHOLD: f64 = 0.1;

/// Histogram resolution of the tuning estimate, in fractions of a bin
const TUNING_RESOLUTION: f64 = 0.01;

/// Octaves relative to A440/16 for a given tuning offset
fn hz_to_octs(hz: f64, tuning: f64) -> f64 {
    let a440 = 440.0 * 2f64.powf(tuning / N_CHROMA as f64);
    (hz / (a440 / 16.0)).log2()
}

/// Chroma analyzer
pub struct ChromaAnalyzer {
    sample_rate: u32,
    n_fft: usize,
}

impl ChromaAnalyzer {
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        Self { sample_rate, n_fft }
    }

    /// Per-frame chroma, max-normalised (silent frames stay zero)
    pub fn compute(&self, power: &[Vec<f64>]) -> Vec<[f64; N_CHROMA]> {
        let tuning = estimate_tuning(power, self.sample_rate, self.n_fft);
        tracing::debug!(tuning, "Estimated tuning offset");

        let filterbank = chroma_filterbank(self.sample_rate, self.n_fft, tuning);

        power
            .iter()
            .map(|frame| {
                let mut chroma = [0.0; N_CHROMA];
                for (c, weights) in chroma.iter_mut().zip(&filterbank) {
                    *c = weights.iter().zip(frame).map(|(w, p)| w * p).sum();
                }

                let max = chroma.iter().fold(0.0f64, |m, c| m.max(c.abs()));
                if max > f64::MIN_POSITIVE {
                    for c in chroma.iter_mut() {
                        *c /= max;
                    }
                }
                chroma
            })
            .collect()
    }
}

/// Chroma filterbank: `N_CHROMA` rows of `n_fft / 2 + 1` weights, row 0 = C
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize, tuning: f64) -> Vec<Vec<f64>> {
    let n_chroma = N_CHROMA as f64;
    let n_bins = n_fft / 2 + 1;
    let half = (n_chroma / 2.0).round();

    // Fractional pitch-class position of every bin; bin 0 (DC) is placed
    // 1.5 octaves below bin 1. One extra bin is needed for the widths.
    let mut frqbins = Vec::with_capacity(n_bins + 1);
    frqbins.push(0.0);
    for k in 1..=n_bins {
        let hz = k as f64 * sample_rate as f64 / n_fft as f64;
        frqbins.push(n_chroma * hz_to_octs(hz, tuning));
    }
    frqbins[0] = frqbins[1] - 1.5 * n_chroma;

    let widths: Vec<f64> = (0..n_bins)
        .map(|k| (frqbins[k + 1] - frqbins[k]).max(1.0))
        .collect();

    // rows[c][k] before the roll that puts C first
    let mut rows = vec![vec![0.0; n_bins]; N_CHROMA];
    for k in 0..n_bins {
        let mut norm = 0.0;
        for (c, row) in rows.iter_mut().enumerate() {
            let d = (frqbins[k] - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            let w = (-0.5 * (2.0 * d / widths[k]).powi(2)).exp();
            row[k] = w;
            norm += w * w;
        }

        let norm = norm.sqrt();
        let octave_weight =
            (-0.5 * ((frqbins[k] / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        let scale = if norm > f64::MIN_POSITIVE {
            octave_weight / norm
        } else {
            octave_weight
        };
        for row in rows.iter_mut() {
            row[k] *= scale;
        }
    }

    // Reference is A; shift by 3 classes so row 0 is C
    rows.rotate_left(3);
    rows
}

/// Estimate the tuning deviation (in fractions of a chroma bin, [-0.5, 0.5))
///
/// **Algorithm:**
/// 1. Per frame, find local maxima of the spectrum above 10% of the frame
///    maximum between 150 Hz and 4 kHz
/// 2. Refine each peak's frequency by parabolic interpolation
/// 3. Keep peaks at least as strong as the median peak
/// 4. Histogram their deviation from equal temperament; the most populated
///    bin wins
pub fn estimate_tuning(power: &[Vec<f64>], sample_rate: u32, n_fft: usize) -> f64 {
    let freqs = fft_frequencies(sample_rate, n_fft);
    let fmax = TUNING_FMAX.min(sample_rate as f64 / 2.0);

    let mut pitches = Vec::new();
    let mut mags = Vec::new();
    let mut thresholded = Vec::new();

    for frame in power {
        let n = frame.len();
        if n < 3 {
            continue;
        }

        let frame_max = frame.iter().cloned().fold(0.0, f64::max);
        let ref_value = TUNING_THRESHOLD * frame_max;
        thresholded.clear();
        thresholded.extend(frame.iter().map(|&s| if s > ref_value { s } else { 0.0 }));

        for k in 0..n {
            if !(TUNING_FMIN <= freqs[k] && freqs[k] < fmax) {
                continue;
            }

            let prev = thresholded[k.saturating_sub(1)];
            let next = thresholded[(k + 1).min(n - 1)];
            if !(thresholded[k] > prev && thresholded[k] >= next) {
                continue;
            }

            let shift = parabolic_shift(frame, k);
            let gradient = if k == 0 {
                frame[1] - frame[0]
            } else if k == n - 1 {
                frame[n - 1] - frame[n - 2]
            } else {
                (frame[k + 1] - frame[k - 1]) / 2.0
            };

            let pitch = (k as f64 + shift) * sample_rate as f64 / n_fft as f64;
            if pitch > 0.0 {
                pitches.push(pitch);
                mags.push(frame[k] + 0.5 * gradient * shift);
            }
        }
    }

    if pitches.is_empty() {
        return 0.0;
    }

    let threshold = median(&mags);
    let selected: Vec<f64> = pitches
        .iter()
        .zip(&mags)
        .filter(|&(_, &m)| m >= threshold)
        .map(|(&p, _)| p)
        .collect();

    pitch_tuning(&selected)
}

/// Vertex offset of the parabola through bins `k-1`, `k`, `k+1`
fn parabolic_shift(frame: &[f64], k: usize) -> f64 {
    if k == 0 || k + 1 >= frame.len() {
        return 0.0;
    }

    let a = frame[k + 1] + frame[k - 1] - 2.0 * frame[k];
    let b = (frame[k + 1] - frame[k - 1]) / 2.0;
    if b.abs() >= a.abs() {
        0.0
    } else {
        -b / a
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most common deviation of `frequencies` from the equal-tempered grid
pub fn pitch_tuning(frequencies: &[f64]) -> f64 {
    let n_bins = (1.0 / TUNING_RESOLUTION).ceil() as usize;
    let edges: Vec<f64> = (0..=n_bins)
        .map(|i| -0.5 + i as f64 / n_bins as f64)
        .collect();
    let mut counts = vec![0usize; n_bins];

    for &f in frequencies.iter().filter(|&&f| f > 0.0) {
        let mut residual = (N_CHROMA as f64 * hz_to_octs(f, 0.0)).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }

        let bin = edges
            .partition_point(|&e| e <= residual)
            .saturating_sub(1)
            .min(n_bins - 1);
        counts[bin] += 1;
    }

    if counts.iter().all(|&c| c == 0) {
        return 0.0;
    }

    // First maximum wins on ties
    let mut best = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = i;
        }
    }
    edges[best]
}
