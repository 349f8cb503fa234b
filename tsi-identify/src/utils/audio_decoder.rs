//! Audio Decoding Utilities
//!
//! **Purpose:** Decode canonical-container audio to the mono f32 sample
//! sequence the feature extractor analyses.
//!
//! Uses symphonia for format-agnostic decoding (WAV, FLAC, MP3, Vorbis, AAC)
//! and rubato to bring every clip to [`ANALYSIS_SAMPLE_RATE`].

use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;

use crate::features::ANALYSIS_SAMPLE_RATE;
use crate::utils::resampler::{resample_mono, ResampleError};

/// Decode errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input artifact missing or unreadable
    #[error("Failed to open audio file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zero-length input
    #[error("Audio input is empty (0 bytes)")]
    EmptyInput,

    /// Container not recognised, or header corrupt
    #[error("Unrecognised or corrupt audio container: {0}")]
    Format(String),

    /// Container has no audio track with a known codec
    #[error("No audio track found in input")]
    NoAudioTrack,

    /// Track parameters incomplete or codec unsupported
    #[error("Unsupported audio stream: {0}")]
    Unsupported(String),

    /// Fatal error while reading packets
    #[error("Error reading audio stream: {0}")]
    Stream(String),

    /// Stream decoded to nothing
    #[error("Audio stream contains no decodable samples")]
    NoSamples,

    /// Decoded stream exceeds the configured duration limit
    #[error("Audio is longer than the {max_seconds}s limit")]
    TooLong { max_seconds: u64 },

    /// Sample-rate conversion failed
    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Lowest source sample rate accepted from a stream header
pub const MIN_SOURCE_SAMPLE_RATE: u32 = 4_000;

/// Highest source sample rate accepted from a stream header
pub const MAX_SOURCE_SAMPLE_RATE: u32 = 384_000;

/// Bounds applied while decoding untrusted input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Longest stream decoded before giving up, in seconds
    pub max_duration_secs: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: 600,
        }
    }
}

/// Mono audio at the analysis sample rate
///
/// Created by decode, consumed by feature computation. Amplitudes are in
/// the normalised [-1.0, 1.0] range (up to resampler ripple).
#[derive(Debug, Clone)]
pub struct CanonicalAudio {
    samples: Vec<f32>,
    source_sample_rate: u32,
    source_channels: usize,
}

impl CanonicalAudio {
    /// Wrap mono samples recorded at `sample_rate`, resampling if needed
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DecodeError> {
        Self::from_decoded(samples, sample_rate, 1)
    }

    fn from_decoded(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: usize,
    ) -> Result<Self, DecodeError> {
        if samples.is_empty() {
            return Err(DecodeError::NoSamples);
        }

        let samples = if sample_rate == ANALYSIS_SAMPLE_RATE {
            samples
        } else {
            resample_mono(&samples, sample_rate, ANALYSIS_SAMPLE_RATE)?
        };

        Ok(Self {
            samples,
            source_sample_rate: sample_rate,
            source_channels: channels,
        })
    }

    /// Mono samples at [`ANALYSIS_SAMPLE_RATE`]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Always [`ANALYSIS_SAMPLE_RATE`]
    pub fn sample_rate(&self) -> u32 {
        ANALYSIS_SAMPLE_RATE
    }

    /// Sample rate of the decoded stream before resampling
    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    /// Channel count of the decoded stream before downmixing
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / ANALYSIS_SAMPLE_RATE as f64
    }
}

/// Decode audio file to canonical mono samples
///
/// **Algorithm:**
/// 1. Open file and detect the format with symphonia (extension as hint)
/// 2. Find the first audio track with a known codec
/// 3. Decode all packets, averaging channels to mono
/// 4. Resample to [`ANALYSIS_SAMPLE_RATE`]
///
/// # Errors
/// * [`DecodeError::Io`] if the file is missing or unreadable
/// * Any other variant for corrupt, unsupported or empty streams
pub fn decode_audio_file(file_path: &Path) -> Result<CanonicalAudio, DecodeError> {
    decode_audio_file_with_limits(file_path, &DecodeLimits::default())
}

/// [`decode_audio_file`] with explicit [`DecodeLimits`]
pub fn decode_audio_file_with_limits(
    file_path: &Path,
    limits: &DecodeLimits,
) -> Result<CanonicalAudio, DecodeError> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let io_error = |source| DecodeError::Io {
        path: file_path.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(file_path).map_err(io_error)?;
    if file.metadata().map_err(io_error)?.len() == 0 {
        return Err(DecodeError::EmptyInput);
    }

    let extension = file_path.extension().and_then(|e| e.to_str());
    guarded_decode(
        Box::new(file),
        extension,
        &file_path.display().to_string(),
        limits,
    )
}

/// Decode an in-memory buffer to canonical mono samples
pub fn decode_audio_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<CanonicalAudio, DecodeError> {
    decode_audio_bytes_with_limits(bytes, extension, &DecodeLimits::default())
}

/// [`decode_audio_bytes`] with explicit [`DecodeLimits`]
pub fn decode_audio_bytes_with_limits(
    bytes: Vec<u8>,
    extension: Option<&str>,
    limits: &DecodeLimits,
) -> Result<CanonicalAudio, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    guarded_decode(Box::new(Cursor::new(bytes)), extension, "<memory>", limits)
}

/// Run the decoder, turning a panic on malformed headers into an error
fn guarded_decode(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    label: &str,
    limits: &DecodeLimits,
) -> Result<CanonicalAudio, DecodeError> {
    catch_unwind(AssertUnwindSafe(|| decode_source(source, extension, label, limits)))
        .unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(
                source = label,
                reason = %reason,
                "Decoder panicked on malformed input"
            );
            Err(DecodeError::Format(format!("malformed stream: {}", reason)))
        })
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    label: &str,
    limits: &DecodeLimits,
) -> Result<CanonicalAudio, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Format(e.to_string()))?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Unsupported("sample rate unknown".to_string()))?;
    let channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    if !(MIN_SOURCE_SAMPLE_RATE..=MAX_SOURCE_SAMPLE_RATE).contains(&sample_rate) {
        return Err(DecodeError::Unsupported(format!(
            "sample rate {} Hz outside {}..={} Hz",
            sample_rate, MIN_SOURCE_SAMPLE_RATE, MAX_SOURCE_SAMPLE_RATE
        )));
    }
    let max_samples = limits
        .max_duration_secs
        .saturating_mul(sample_rate as u64)
        .min(usize::MAX as u64) as usize;

    tracing::debug!(
        source = label,
        sample_rate = sample_rate,
        channels = channel_count,
        "Audio stream info"
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Stream(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                append_mono(&decoded, &mut mono);
                if mono.len() > max_samples {
                    return Err(DecodeError::TooLong {
                        max_seconds: limits.max_duration_secs,
                    });
                }
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                skipped_packets += 1;
                tracing::warn!(source = label, "Skipping undecodable packet: {}", msg);
            }
            Err(e) => return Err(DecodeError::Stream(e.to_string())),
        }
    }

    tracing::debug!(
        source = label,
        total_samples = mono.len(),
        skipped_packets,
        "Audio decoding complete"
    );

    CanonicalAudio::from_decoded(mono, sample_rate, channel_count)
}

/// Average all channels of a decoded buffer into `out`
fn append_mono(decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => mix_down(&**buf, out),
        AudioBufferRef::U16(buf) => mix_down(&**buf, out),
        AudioBufferRef::U24(buf) => mix_down(&**buf, out),
        AudioBufferRef::U32(buf) => mix_down(&**buf, out),
        AudioBufferRef::S8(buf) => mix_down(&**buf, out),
        AudioBufferRef::S16(buf) => mix_down(&**buf, out),
        AudioBufferRef::S24(buf) => mix_down(&**buf, out),
        AudioBufferRef::S32(buf) => mix_down(&**buf, out),
        AudioBufferRef::F32(buf) => mix_down(&**buf, out),
        AudioBufferRef::F64(buf) => mix_down(&**buf, out),
    }
}

fn mix_down<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count();
    if num_channels == 0 {
        return;
    }

    let num_frames = buf.frames();
    out.reserve(num_frames);

    for frame_idx in 0..num_frames {
        let mut sum = 0.0f32;
        for ch in 0..num_channels {
            sum += f32::from_sample(buf.chan(ch)[frame_idx]);
        }
        out.push(sum / num_channels as f32);
    }
}
