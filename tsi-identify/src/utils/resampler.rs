//! Mono sample-rate conversion
//!
//! High-quality resampling using rubato `SincFixedIn` (single pass over the
//! whole clip). The filter delay is trimmed so sample 0 of the output lines
//! up with sample 0 of the input.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

/// Sinc filter length (taps)
const SINC_LEN: usize = 256;

/// Extra flush calls allowed when one chunk does not drain the filter
const MAX_FLUSHES: usize = 4;

/// Resampling errors
#[derive(Debug, Error)]
pub enum ResampleError {
    /// Invalid rates or parameters
    #[error("Failed to create rubato resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    /// Processing failure
    #[error("Rubato resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),

    /// Resampler produced fewer frames than the input length implies
    #[error("Resampler produced {produced} frames, expected {expected}")]
    ShortOutput { expected: usize, produced: usize },
}

/// Resample a mono signal from `source_rate` to `target_rate`
///
/// Returns `ceil(len * target_rate / source_rate)` samples. Identity when the
/// rates match or the input is empty.
pub fn resample_mono(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (samples.len() as f64 * ratio).ceil() as usize;

    // The filter holds back about `delay` frames at each end, so the zero
    // tail must yield at least twice that in output frames
    let tail = 2 * SINC_LEN + (SINC_LEN as f64 / ratio).ceil() as usize;
    let mut padded = Vec::with_capacity(samples.len() + tail);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + tail, 0.0);

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, padded.len(), 1)?;
    let delay = resampler.output_delay();

    let input_channels = vec![padded];
    let mut output = resampler
        .process(&input_channels, None)?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush whatever the filter still holds
    let mut flushes = 0;
    while output.len() < delay + expected && flushes < MAX_FLUSHES {
        let flushed = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        match flushed.into_iter().next() {
            Some(frames) if !frames.is_empty() => output.extend(frames),
            _ => break,
        }
        flushes += 1;
    }

    if output.len() < delay + expected {
        return Err(ResampleError::ShortOutput {
            expected,
            produced: output.len().saturating_sub(delay),
        });
    }

    tracing::debug!(
        source_rate,
        target_rate,
        input_frames = samples.len(),
        output_frames = expected,
        "Resampled mono signal"
    );

    output.truncate(delay + expected);
    output.drain(..delay);
    Ok(output)
}
