//! Per-request identification pipeline
//!
//! **Flow:**
//! 1. Create a scratch workspace and stage the upload in it
//! 2. Normalize the container (external transcoder when needed)
//! 3. Decode and compute features on the blocking pool
//! 4. Drop the workspace, deleting every artifact
//!
//! The pipeline holds no per-request state; one instance serves all
//! requests concurrently.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};
use tsi_common::ServiceConfig;

use super::container_normalizer::{AudioBuffer, ContainerNormalizer, TranscodeError};
use super::request_workspace::RequestWorkspace;
use crate::features::{FeatureError, FeatureExtractor, FeatureRecord, ANALYSIS_SAMPLE_RATE};
use crate::models::AnalysisSummary;
use crate::utils::{decode_audio_file_with_limits, DecodeError, DecodeLimits};

/// Pipeline failure kinds
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Decode(DecodeError),

    /// Intermediate artifact missing, unreadable or unwritable
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Feature computation failed: {0}")]
    FeatureComputation(#[from] FeatureError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Io { .. } => PipelineError::Io(err.to_string()),
            other => PipelineError::Decode(other),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

/// Successful pipeline result
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub features: FeatureRecord,
    pub analysis: AnalysisSummary,
}

pub struct IdentificationPipeline {
    normalizer: ContainerNormalizer,
    extractor: Arc<FeatureExtractor>,
    limits: DecodeLimits,
    scratch_root: PathBuf,
}

impl IdentificationPipeline {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            normalizer: ContainerNormalizer::new(config.transcoder.clone()),
            extractor: Arc::new(FeatureExtractor::new()),
            limits: DecodeLimits {
                max_duration_secs: config.uploads.max_duration_secs,
            },
            scratch_root: config.uploads.scratch_root(),
        }
    }

    /// Run one upload through normalize → decode → extract
    pub async fn process(&self, buffer: AudioBuffer) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let container = buffer.container.to_string();
        let transcoded = !buffer.container.is_decodable();

        let workspace = RequestWorkspace::create(&self.scratch_root)?;
        let staged = workspace.stage(&buffer).await?;
        drop(buffer);

        let canonical = self.normalizer.normalize(staged, workspace.path()).await?;
        debug!(
            path = %canonical.path.display(),
            transcoded,
            "Canonical audio ready"
        );

        let extractor = Arc::clone(&self.extractor);
        let path = canonical.path.clone();
        let limits = self.limits;
        let (features, duration_seconds, frame_count) =
            tokio::task::spawn_blocking(move || -> Result<_, PipelineError> {
                let audio = decode_audio_file_with_limits(&path, &limits)?;
                let features = extractor.extract(&audio)?;
                let frame_count = extractor.frame_count(audio.samples().len());
                Ok((features, audio.duration_seconds(), frame_count))
            })
            .await
            .map_err(|e| PipelineError::Internal(format!("Feature task failed: {}", e)))??;

        // Workspace (and every artifact in it) is removed here
        drop(workspace);

        info!(
            container = %container,
            transcoded,
            duration_seconds,
            frames = frame_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Audio processed"
        );

        Ok(PipelineOutcome {
            features,
            analysis: AnalysisSummary {
                container,
                transcoded,
                sample_rate: ANALYSIS_SAMPLE_RATE,
                duration_seconds,
                frame_count,
            },
        })
    }
}
