//! Identification pipeline integration tests
//!
//! Drive `IdentificationPipeline` and `FeatureExtractor` with synthesised
//! WAV clips; scratch directories live in per-test temp roots so leftover
//! artifacts can be detected.

mod helpers;

use helpers::{
    dir_entry_count, generate_test_wav, generate_test_wav_bytes, silent_wav_with_rate, ToneConfig,
};
use tempfile::TempDir;
use tsi_common::config::TranscoderConfig;
use tsi_common::ServiceConfig;
use tsi_identify::features::{FeatureExtractor, N_CHROMA, N_CONTRAST, N_MFCC};
use tsi_identify::services::{
    AudioBuffer, ContainerHint, IdentificationPipeline, PipelineError, TranscodeError,
};
use tsi_identify::utils::DecodeError;

fn test_config(scratch: &TempDir, transcoder: Option<TranscoderConfig>) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.uploads.scratch_dir = Some(scratch.path().to_path_buf());
    if let Some(transcoder) = transcoder {
        config.transcoder = transcoder;
    }
    config
}

fn copy_transcoder() -> TranscoderConfig {
    TranscoderConfig {
        program: "cp".to_string(),
        args: vec!["{input}".to_string(), "{output}".to_string()],
        timeout_secs: 10,
    }
}

fn tone_bytes(frequency_hz: f32, duration_seconds: f64) -> Vec<u8> {
    generate_test_wav_bytes(&ToneConfig {
        frequency_hz,
        duration_seconds,
        ..ToneConfig::default()
    })
    .unwrap()
}

#[test]
fn test_record_lengths_independent_of_duration() {
    let dir = TempDir::new().unwrap();
    let extractor = FeatureExtractor::new();

    for seconds in [1.0, 3.0] {
        let path = dir.path().join(format!("tone_{}.wav", seconds));
        generate_test_wav(
            &path,
            &ToneConfig {
                duration_seconds: seconds,
                ..ToneConfig::default()
            },
        )
        .unwrap();

        let record = extractor.extract_file(&path).unwrap();
        assert_eq!(record.mfccs().len(), N_MFCC);
        assert_eq!(record.contrast().len(), N_CONTRAST);
        assert_eq!(record.chroma().len(), N_CHROMA);
        assert_eq!(record.mfccs().len(), 13);
        assert_eq!(record.chroma().len(), 12);
    }
}

#[test]
fn test_stereo_44k_clip_is_downmixed_and_resampled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stereo.wav");
    generate_test_wav(
        &path,
        &ToneConfig {
            sample_rate: 44100,
            channels: 2,
            duration_seconds: 1.0,
            ..ToneConfig::default()
        },
    )
    .unwrap();

    let record = FeatureExtractor::new().extract_file(&path).unwrap();
    let best = record
        .chroma()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(best, 9, "440 Hz should land on pitch class A");
}

#[tokio::test]
async fn test_pipeline_success_and_cleanup() {
    let scratch = TempDir::new().unwrap();
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, None));

    let bytes = tone_bytes(440.0, 3.0);
    let hint = ContainerHint::resolve(Some("tone.wav"), Some("audio/wav"), &bytes);
    let outcome = pipeline
        .process(AudioBuffer::new(bytes, hint))
        .await
        .unwrap();

    assert_eq!(outcome.analysis.container, "wav");
    assert!(!outcome.analysis.transcoded);
    assert_eq!(outcome.analysis.sample_rate, 22050);
    assert!((outcome.analysis.duration_seconds - 3.0).abs() < 0.01);
    assert_eq!(outcome.analysis.frame_count, 1 + 66150 / 512);
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[tokio::test]
async fn test_pipeline_is_idempotent() {
    let scratch = TempDir::new().unwrap();
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, None));
    let bytes = tone_bytes(523.25, 1.0);
    let wav = ContainerHint::from_extension("wav");

    let first = pipeline
        .process(AudioBuffer::new(bytes.clone(), wav.clone()))
        .await
        .unwrap();
    let second = pipeline
        .process(AudioBuffer::new(bytes, wav))
        .await
        .unwrap();

    assert_eq!(first.features, second.features);
}

#[cfg(unix)]
#[tokio::test]
async fn test_transcoded_input_matches_direct_input() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(&scratch, Some(copy_transcoder()));
    let pipeline = IdentificationPipeline::new(&config);
    let bytes = tone_bytes(440.0, 1.0);

    let direct = pipeline
        .process(AudioBuffer::new(bytes.clone(), ContainerHint::from_extension("wav")))
        .await
        .unwrap();
    // Same bytes declared as a browser recording: goes through the transcoder
    let transcoded = pipeline
        .process(AudioBuffer::new(bytes, ContainerHint::from_extension("webm")))
        .await
        .unwrap();

    assert!(!direct.analysis.transcoded);
    assert!(transcoded.analysis.transcoded);
    assert_eq!(transcoded.analysis.container, "webm");

    let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4);
    assert!(close(direct.features.mfccs(), transcoded.features.mfccs()));
    assert!(close(direct.features.contrast(), transcoded.features.contrast()));
    assert!(close(direct.features.chroma(), transcoded.features.chroma()));
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[tokio::test]
async fn test_corrupt_input_is_decode_error() {
    let scratch = TempDir::new().unwrap();
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, None));

    let bytes = b"This is definitely not a RIFF file, just some text.".to_vec();
    let hint = ContainerHint::resolve(Some("notes.wav"), Some("audio/wav"), &bytes);
    let err = pipeline
        .process(AudioBuffer::new(bytes, hint))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode(_)), "got {:?}", err);
    assert!(!err.to_string().is_empty());
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[tokio::test]
async fn test_zero_byte_input_is_decode_error() {
    let scratch = TempDir::new().unwrap();
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, None));

    let err = pipeline
        .process(AudioBuffer::new(Vec::new(), ContainerHint::from_extension("wav")))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Decode(DecodeError::EmptyInput)),
        "got {:?}",
        err
    );
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_transcoder_is_transcode_error() {
    let scratch = TempDir::new().unwrap();
    let transcoder = TranscoderConfig {
        program: "false".to_string(),
        args: vec!["{input}".to_string(), "{output}".to_string()],
        timeout_secs: 10,
    };
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, Some(transcoder)));

    let err = pipeline
        .process(AudioBuffer::new(
            b"webm bytes".to_vec(),
            ContainerHint::from_extension("webm"),
        ))
        .await
        .unwrap_err();

    match err {
        PipelineError::Transcode(TranscodeError::Failed { diagnostic }) => {
            assert!(!diagnostic.is_empty())
        }
        other => panic!("expected transcode failure, got {:?}", other),
    }
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_transcoder_output_is_io_error() {
    let scratch = TempDir::new().unwrap();
    // Exits 0 without writing anything
    let transcoder = TranscoderConfig {
        program: "true".to_string(),
        args: vec!["{input}".to_string(), "{output}".to_string()],
        timeout_secs: 10,
    };
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, Some(transcoder)));

    let err = pipeline
        .process(AudioBuffer::new(
            tone_bytes(440.0, 0.5),
            ContainerHint::from_extension("webm"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Io(_)), "got {:?}", err);
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[tokio::test]
async fn test_zero_sample_rate_header_is_decode_error() {
    let scratch = TempDir::new().unwrap();
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, None));

    let err = pipeline
        .process(AudioBuffer::new(
            silent_wav_with_rate(0, 256),
            ContainerHint::from_extension("wav"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode(_)), "got {:?}", err);
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[tokio::test]
async fn test_one_hertz_header_is_rejected_before_resampling() {
    let scratch = TempDir::new().unwrap();
    let pipeline = IdentificationPipeline::new(&test_config(&scratch, None));

    let err = pipeline
        .process(AudioBuffer::new(
            silent_wav_with_rate(1, 1024),
            ContainerHint::from_extension("wav"),
        ))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Decode(DecodeError::Unsupported(_))),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_clip_over_duration_limit_is_decode_error() {
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(&scratch, None);
    config.uploads.max_duration_secs = 1;
    let pipeline = IdentificationPipeline::new(&config);

    let err = pipeline
        .process(AudioBuffer::new(
            tone_bytes(440.0, 2.0),
            ContainerHint::from_extension("wav"),
        ))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Decode(DecodeError::TooLong { max_seconds: 1 })),
        "got {:?}",
        err
    );
    assert_eq!(dir_entry_count(scratch.path()), 0);
}
