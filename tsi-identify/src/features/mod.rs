//! Acoustic feature extraction
//!
//! Turns a [`CanonicalAudio`] clip into a fixed-size [`FeatureRecord`]:
//! 13 MFCCs, 7 spectral-contrast values and 12 chroma values, each the
//! arithmetic mean of its per-frame values over the whole clip.
//!
//! All three features share one power spectrogram (`N_FFT` / `HOP_LENGTH`,
//! centered frames, periodic Hann window), so the record's shape never
//! depends on clip duration.

pub mod chroma;
pub mod contrast;
pub mod mfcc;
pub mod spectrogram;

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::utils::{decode_audio_file, CanonicalAudio, DecodeError};
use chroma::ChromaAnalyzer;
use contrast::ContrastAnalyzer;
use mfcc::MfccAnalyzer;
use spectrogram::Stft;

/// Sample rate every clip is analysed at, in Hz
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// FFT window length in samples
pub const N_FFT: usize = 2048;

/// Hop between analysis frames in samples
pub const HOP_LENGTH: usize = 512;

/// Mel bands feeding the cepstrum
pub const N_MELS: usize = 128;

/// Cepstral coefficients kept
pub const N_MFCC: usize = 13;

/// Octave bands for spectral contrast (plus one residual band)
pub const CONTRAST_BANDS: usize = 6;

/// Spectral contrast values per frame
pub const N_CONTRAST: usize = CONTRAST_BANDS + 1;

/// Pitch classes
pub const N_CHROMA: usize = 12;

/// Feature computation errors
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Cannot extract features from an empty signal")]
    EmptySignal,

    #[error("Contrast band edge {frequency_hz} Hz exceeds Nyquist ({nyquist_hz} Hz)")]
    BandExceedsNyquist { frequency_hz: f64, nyquist_hz: f64 },

    #[error("Contrast band {0} contains no FFT bins")]
    EmptyBand(usize),

    #[error("Non-finite value in {0} features")]
    NonFinite(&'static str),
}

/// Decode + feature errors for the file-based entry point
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Clip-level feature summary
///
/// Field order in JSON matches the response contract: `mfccs`, `contrast`,
/// `chroma`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    mfccs: [f32; N_MFCC],
    contrast: [f32; N_CONTRAST],
    chroma: [f32; N_CHROMA],
}

impl FeatureRecord {
    pub fn mfccs(&self) -> &[f32; N_MFCC] {
        &self.mfccs
    }

    pub fn contrast(&self) -> &[f32; N_CONTRAST] {
        &self.contrast
    }

    pub fn chroma(&self) -> &[f32; N_CHROMA] {
        &self.chroma
    }
}

/// Feature extractor with pre-built filterbanks and FFT plan
///
/// Cheap to share: build once at startup, call [`FeatureExtractor::extract`]
/// from any thread.
pub struct FeatureExtractor {
    stft: Stft,
    mfcc: MfccAnalyzer,
    contrast: ContrastAnalyzer,
    chroma: ChromaAnalyzer,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            stft: Stft::new(N_FFT, HOP_LENGTH),
            mfcc: MfccAnalyzer::new(ANALYSIS_SAMPLE_RATE, N_FFT),
            contrast: ContrastAnalyzer::new(ANALYSIS_SAMPLE_RATE, N_FFT),
            chroma: ChromaAnalyzer::new(ANALYSIS_SAMPLE_RATE, N_FFT),
        }
    }

    /// Number of analysis frames a clip of `n_samples` produces
    pub fn frame_count(&self, n_samples: usize) -> usize {
        self.stft.frame_count(n_samples)
    }

    /// Compute the clip-level feature record
    pub fn extract(&self, audio: &CanonicalAudio) -> Result<FeatureRecord, FeatureError> {
        let samples: Vec<f64> = audio.samples().iter().map(|&s| s as f64).collect();
        if samples.is_empty() {
            return Err(FeatureError::EmptySignal);
        }

        let power = self.stft.power_spectrogram(&samples);
        tracing::debug!(
            samples = samples.len(),
            frames = power.len(),
            "Computed power spectrogram"
        );

        let mfccs = time_average(&self.mfcc.compute(&power));
        let contrast = time_average(&self.contrast.compute(&power)?);
        let chroma = time_average(&self.chroma.compute(&power));

        Ok(FeatureRecord {
            mfccs: to_finite_f32(mfccs, "mfcc")?,
            contrast: to_finite_f32(contrast, "contrast")?,
            chroma: to_finite_f32(chroma, "chroma")?,
        })
    }

    /// Decode a canonical audio file and compute its feature record
    pub fn extract_file(&self, path: &Path) -> Result<FeatureRecord, ExtractionError> {
        let audio = decode_audio_file(path)?;
        Ok(self.extract(&audio)?)
    }
}

/// Arithmetic mean over frames, per coefficient
fn time_average<const N: usize>(frames: &[[f64; N]]) -> [f64; N] {
    let mut mean = [0.0; N];
    if frames.is_empty() {
        return mean;
    }

    for frame in frames {
        for (m, v) in mean.iter_mut().zip(frame) {
            *m += v;
        }
    }
    let n = frames.len() as f64;
    for m in mean.iter_mut() {
        *m /= n;
    }
    mean
}

fn to_finite_f32<const N: usize>(
    values: [f64; N],
    feature: &'static str,
) -> Result<[f32; N], FeatureError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FeatureError::NonFinite(feature));
    }
    Ok(values.map(|v| v as f32))
}
