//! Service modules for the identification pipeline

pub mod container_normalizer;
pub mod identification_pipeline;
pub mod request_workspace;

pub use container_normalizer::{
    AudioBuffer, ContainerHint, ContainerNormalizer, StagedAudio, TranscodeError,
};
pub use identification_pipeline::{IdentificationPipeline, PipelineError, PipelineOutcome};
pub use request_workspace::RequestWorkspace;
