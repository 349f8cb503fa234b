//! Container normalisation
//!
//! Decides whether an upload can be decoded as-is and, when it cannot,
//! runs the configured external transcoder to produce a canonical WAV next
//! to it. The normalizer never deletes anything: every artifact lives in
//! the caller's request workspace.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use tsi_common::config::{TranscoderConfig, INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};

/// Containers the decoder reads directly
const DECODABLE: &[&str] = &["wav", "wave", "flac", "mp3", "ogg", "oga", "m4a", "aac"];

/// Hint used when nothing identifies the upload
const UNKNOWN_CONTAINER: &str = "bin";

/// Canonical container written by the transcoder
const CANONICAL_CONTAINER: &str = "wav";

/// File name of the transcoder's output inside the workspace
pub const CANONICAL_FILE_NAME: &str = "canonical.wav";

const MAX_EXTENSION_LEN: usize = 8;

/// Transcoding errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Transcoder could not be started at all
    #[error("Failed to start transcoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Transcoder ran and reported failure
    #[error("Transcoder failed: {diagnostic}")]
    Failed { diagnostic: String },

    /// Transcoder exceeded its wall-clock limit and was killed
    #[error("Transcoder timed out after {seconds}s")]
    TimedOut { seconds: u64 },
}

/// Lower-case container name such as `wav` or `webm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHint(String);

impl ContainerHint {
    /// Resolve the container of an upload
    ///
    /// Magic bytes win over the client-supplied filename, which wins over
    /// the multipart content type.
    pub fn resolve(filename: Option<&str>, content_type: Option<&str>, bytes: &[u8]) -> Self {
        if let Some(kind) = infer::get(bytes) {
            if matches!(
                kind.matcher_type(),
                infer::MatcherType::Audio | infer::MatcherType::Video
            ) {
                return Self(kind.extension().to_ascii_lowercase());
            }
        }

        let from_name = filename
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .and_then(sanitize);
        if let Some(ext) = from_name {
            return Self(ext);
        }

        let from_mime = content_type
            .and_then(|mime| mime.split(';').next())
            .and_then(|mime| mime.split_once('/'))
            .and_then(|(_, subtype)| sanitize(subtype.trim()));
        if let Some(ext) = from_mime {
            return Self(ext);
        }

        Self(UNKNOWN_CONTAINER.to_string())
    }

    /// Hint for a known container name
    pub fn from_extension(ext: &str) -> Self {
        sanitize(ext)
            .map(Self)
            .unwrap_or_else(|| Self(UNKNOWN_CONTAINER.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the decoder reads this container without transcoding
    pub fn is_decodable(&self) -> bool {
        DECODABLE.contains(&self.0.as_str())
    }
}

impl std::fmt::Display for ContainerHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep extension-like strings filesystem-safe
fn sanitize(raw: &str) -> Option<String> {
    if raw.is_empty()
        || raw.len() > MAX_EXTENSION_LEN
        || !raw.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(raw.to_ascii_lowercase())
}

/// Uploaded bytes plus their container hint
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub bytes: Vec<u8>,
    pub container: ContainerHint,
}

impl AudioBuffer {
    pub fn new(bytes: Vec<u8>, container: ContainerHint) -> Self {
        Self { bytes, container }
    }
}

/// Audio artifact on disk inside a request workspace
#[derive(Debug, Clone, PartialEq)]
pub struct StagedAudio {
    pub path: PathBuf,
    pub container: ContainerHint,
}

/// Container normalizer backed by an external transcoder
#[derive(Debug, Clone)]
pub struct ContainerNormalizer {
    config: TranscoderConfig,
}

impl ContainerNormalizer {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Return `staged` unchanged if decodable, else transcode it to
    /// `<out_dir>/canonical.wav`
    ///
    /// Success is judged by the exit status only; a missing output file is
    /// left for the decoder to report.
    pub async fn normalize(
        &self,
        staged: StagedAudio,
        out_dir: &Path,
    ) -> Result<StagedAudio, TranscodeError> {
        if staged.container.is_decodable() {
            debug!(container = %staged.container, "Container is decodable, no transcode needed");
            return Ok(staged);
        }

        let output = out_dir.join(CANONICAL_FILE_NAME);
        self.transcode(&staged.path, &output).await?;

        Ok(StagedAudio {
            path: output,
            container: ContainerHint(CANONICAL_CONTAINER.to_string()),
        })
    }

    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let input_arg = input.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input_arg)
                    .replace(OUTPUT_PLACEHOLDER, &output_arg)
            })
            .collect();

        debug!(
            program = %self.config.program,
            args = ?args,
            "Running transcoder"
        );

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let limit = Duration::from_secs(self.config.timeout_secs);
        let result = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => {
                // Dropping the wait future drops the child, which kills it
                warn!(
                    program = %self.config.program,
                    timeout_secs = self.config.timeout_secs,
                    "Transcoder timed out, killed"
                );
                return Err(TranscodeError::TimedOut {
                    seconds: self.config.timeout_secs,
                });
            }
        };

        let output = result.map_err(|e| TranscodeError::Failed {
            diagnostic: format!("waiting for transcoder failed: {}", e),
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostic = if stderr.is_empty() {
            format!("{} exited with {}", self.config.program, output.status)
        } else {
            stderr
        };

        warn!(
            program = %self.config.program,
            status = %output.status,
            diagnostic = %diagnostic,
            "Transcoder failed"
        );
        Err(TranscodeError::Failed { diagnostic })
    }
}
