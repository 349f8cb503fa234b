//! Audio Test Fixture Generator
//!
//! Synthesises sine-tone WAV clips with hound

use std::f32::consts::PI;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct ToneConfig {
    pub frequency_hz: f32,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            duration_seconds: 3.0,
            sample_rate: 22050,
            channels: 1,
            amplitude: 0.5,
        }
    }
}

fn write_tone<W: std::io::Write + std::io::Seek>(
    writer: W,
    config: &ToneConfig,
) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::new(writer, spec)?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;

    for i in 0..total_samples {
        let t = i as f32 / config.sample_rate as f32;
        let value = config.amplitude * (2.0 * PI * config.frequency_hz * t).sin();
        let sample = (value * i16::MAX as f32) as i16;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a WAV file at `path`
pub fn generate_test_wav(path: &Path, config: &ToneConfig) -> anyhow::Result<PathBuf> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_tone(file, config)?;
    Ok(path.to_path_buf())
}

/// Generate a WAV clip in memory
pub fn generate_test_wav_bytes(config: &ToneConfig) -> anyhow::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_tone(&mut cursor, config)?;
    Ok(cursor.into_inner())
}

/// Silent 16-bit mono WAV with an arbitrary header sample rate
///
/// Written by hand so headers hound refuses (rate 0) can be produced.
pub fn silent_wav_with_rate(sample_rate: u32, frames: usize) -> Vec<u8> {
    let data_len = (frames * 2) as u32;
    let mut out = Vec::with_capacity(44 + frames * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&sample_rate.wrapping_mul(2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + frames * 2, 0);
    out
}
