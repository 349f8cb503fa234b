//! Utility modules for tsi-identify

pub mod audio_decoder;
pub mod resampler;

pub use audio_decoder::{
    decode_audio_bytes, decode_audio_bytes_with_limits, decode_audio_file,
    decode_audio_file_with_limits, CanonicalAudio, DecodeError, DecodeLimits,
};
pub use resampler::{resample_mono, ResampleError};
