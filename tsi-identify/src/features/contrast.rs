//! Octave-band spectral contrast
//!
//! For each sub-band, the mean of the top and bottom quantile of the
//! magnitude spectrum gives a peak and a valley level; contrast is their
//! difference in dB. Bands are octaves starting at [`CONTRAST_FMIN`] plus a
//! residual band from the last octave edge up to Nyquist. Each non-initial
//! band borrows one bin from below; all bands but the residual one drop
//! their top bin.

use std::ops::Range;

use super::spectrogram::{fft_frequencies, power_to_db};
use super::{FeatureError, CONTRAST_BANDS, N_CONTRAST};

/// Lower edge of the first octave band, in Hz
pub const CONTRAST_FMIN: f64 = 200.0;

/// Fraction of each band's bins averaged for peak and valley
pub const CONTRAST_QUANTILE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
struct ContrastBand {
    rows: Range<usize>,
    quantile_bins: usize,
}

/// Spectral contrast analyzer
pub struct ContrastAnalyzer {
    sample_rate: u32,
    n_fft: usize,
}

impl ContrastAnalyzer {
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        Self { sample_rate, n_fft }
    }

    /// Per-frame contrast from a power spectrogram
    ///
    /// Contrast is measured on magnitudes, so the power values are
    /// square-rooted first.
    pub fn compute(&self, power: &[Vec<f64>]) -> Result<Vec<[f64; N_CONTRAST]>, FeatureError> {
        let bands = self.bands()?;

        let mut peaks = Vec::with_capacity(power.len() * N_CONTRAST);
        let mut valleys = Vec::with_capacity(power.len() * N_CONTRAST);
        let mut sorted = Vec::new();

        for frame in power {
            for band in &bands {
                sorted.clear();
                sorted.extend(frame[band.rows.clone()].iter().map(|p| p.sqrt()));
                sorted.sort_by(|a, b| a.total_cmp(b));

                let q = band.quantile_bins.min(sorted.len()).max(1);
                let valley = sorted[..q].iter().sum::<f64>() / q as f64;
                let peak = sorted[sorted.len() - q..].iter().sum::<f64>() / q as f64;

                valleys.push(valley);
                peaks.push(peak);
            }
        }

        power_to_db(&mut peaks);
        power_to_db(&mut valleys);

        Ok(peaks
            .chunks(N_CONTRAST)
            .zip(valleys.chunks(N_CONTRAST))
            .map(|(p, v)| {
                let mut contrast = [0.0; N_CONTRAST];
                for (c, (peak, valley)) in contrast.iter_mut().zip(p.iter().zip(v)) {
                    *c = peak - valley;
                }
                contrast
            })
            .collect())
    }

    fn bands(&self) -> Result<Vec<ContrastBand>, FeatureError> {
        let freqs = fft_frequencies(self.sample_rate, self.n_fft);
        let nyquist = self.sample_rate as f64 / 2.0;
        let n_bins = freqs.len();

        // [0, fmin, 2 fmin, 4 fmin, ...]
        let mut edges = vec![0.0; CONTRAST_BANDS + 2];
        for (i, edge) in edges.iter_mut().enumerate().skip(1) {
            *edge = CONTRAST_FMIN * 2f64.powi(i as i32 - 1);
        }

        if let Some(&edge) = edges[..=CONTRAST_BANDS].iter().find(|&&e| e >= nyquist) {
            return Err(FeatureError::BandExceedsNyquist {
                frequency_hz: edge,
                nyquist_hz: nyquist,
            });
        }

        let mut bands = Vec::with_capacity(N_CONTRAST);
        for k in 0..=CONTRAST_BANDS {
            let (low, high) = (edges[k], edges[k + 1]);

            let first = freqs.iter().position(|&f| f >= low && f <= high);
            let last = freqs.iter().rposition(|&f| f >= low && f <= high);
            let (first, last) = match (first, last) {
                (Some(first), Some(last)) => (first, last),
                _ => return Err(FeatureError::EmptyBand(k)),
            };

            let start = if k > 0 { first.saturating_sub(1) } else { first };
            let end_inclusive = if k == CONTRAST_BANDS { n_bins - 1 } else { last };
            let bin_count = end_inclusive - start + 1;

            let rows = if k < CONTRAST_BANDS {
                start..end_inclusive
            } else {
                start..end_inclusive + 1
            };
            if rows.is_empty() {
                return Err(FeatureError::EmptyBand(k));
            }

            let quantile_bins =
                ((CONTRAST_QUANTILE * bin_count as f64).round_ties_even() as usize).max(1);

            bands.push(ContrastBand {
                rows,
                quantile_bins,
            });
        }

        Ok(bands)
    }
}
