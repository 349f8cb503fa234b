//! Configuration loading tests
//!
//! Covers partial TOML files, validation failures and the
//! explicit-path vs. default-path resolution rules.

use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};
use tsi_common::config::{ServiceConfig, INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use tsi_common::Error;

#[test]
fn test_empty_toml_yields_defaults() {
    let config = ServiceConfig::from_toml_str("").unwrap();
    assert_eq!(config, ServiceConfig::default());
}

#[test]
fn test_partial_toml_overrides_only_given_fields() {
    let toml = r#"
        service_name = "Sound ID (staging)"

        [server]
        port = 9100

        [cors]
        allowed_origins = ["https://app.example.com", "http://localhost:5173"]
    "#;

    let config = ServiceConfig::from_toml_str(toml).unwrap();

    assert_eq!(config.service_name, "Sound ID (staging)");
    assert_eq!(config.server.port, 9100);
    // Unspecified field in a given table keeps its default
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.cors.allowed_origins.len(), 2);
    assert_eq!(config.cors.allowed_methods, vec!["*"]);
    assert!(config.cors.allow_credentials);
    assert_eq!(config.transcoder.program, "ffmpeg");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_transcoder_and_uploads_sections() {
    let toml = r#"
        [transcoder]
        program = "/usr/local/bin/ffmpeg"
        args = ["-i", "{input}", "{output}"]
        timeout_secs = 5

        [uploads]
        scratch_dir = "/var/tmp/tsi"
        max_upload_bytes = 1048576
        max_duration_secs = 120

        [logging]
        level = "debug"
        file = "/var/log/tsi.log"
    "#;

    let config = ServiceConfig::from_toml_str(toml).unwrap();

    assert_eq!(config.transcoder.program, "/usr/local/bin/ffmpeg");
    assert_eq!(config.transcoder.timeout_secs, 5);
    assert_eq!(config.uploads.scratch_dir, Some(PathBuf::from("/var/tmp/tsi")));
    assert_eq!(config.uploads.max_upload_bytes, 1_048_576);
    assert_eq!(config.uploads.max_duration_secs, 120);
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/tsi.log")));
}

#[test]
fn test_args_without_output_placeholder_rejected() {
    let toml = format!(
        r#"
        [transcoder]
        args = ["-i", "{}", "out.wav"]
        "#,
        INPUT_PLACEHOLDER
    );

    let err = ServiceConfig::from_toml_str(&toml).unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains(OUTPUT_PLACEHOLDER), "got: {}", msg),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_zero_limits_rejected() {
    assert!(ServiceConfig::from_toml_str("[uploads]\nmax_upload_bytes = 0").is_err());
    assert!(ServiceConfig::from_toml_str("[uploads]\nmax_duration_secs = 0").is_err());
    assert!(ServiceConfig::from_toml_str("[transcoder]\ntimeout_secs = 0").is_err());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = ServiceConfig::from_toml_str("[server\nport = ").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_load_explicit_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nhost = \"127.0.0.1\"\nport = 8123").unwrap();

    let config = ServiceConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8123);
}

#[test]
fn test_load_missing_explicit_file_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = ServiceConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}
