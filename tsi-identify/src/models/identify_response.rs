//! POST /identify-sound response body

use serde::Serialize;

use crate::features::FeatureRecord;

pub const SUCCESS_MESSAGE: &str = "Audio processed successfully";

/// What the pipeline saw while processing the upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    /// Container hint resolved for the upload
    pub container: String,

    /// Whether the external transcoder ran
    pub transcoded: bool,

    /// Analysis sample rate in Hz
    pub sample_rate: u32,

    /// Decoded clip length in seconds
    pub duration_seconds: f64,

    /// Analysis frames averaged into each feature
    pub frame_count: usize,
}

/// Candidate sound
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundMatch {
    pub id: String,
    pub name: String,
    pub confidence: f32,
    pub url: String,
}

/// Fixed stand-in list; no matching is performed
pub fn placeholder_matches() -> Vec<SoundMatch> {
    vec![SoundMatch {
        id: "1".to_string(),
        name: "Sample TikTok Sound".to_string(),
        confidence: 0.85,
        url: "https://example.com/sound1".to_string(),
    }]
}

/// Successful identification response
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResponse {
    /// Always "success"
    pub status: &'static str,
    pub message: String,
    pub features: FeatureRecord,
    pub matches: Vec<SoundMatch>,
    /// `matches` is static and unrelated to the upload
    pub matches_placeholder: bool,
    pub analysis: AnalysisSummary,
}

impl IdentifyResponse {
    pub fn new(features: FeatureRecord, analysis: AnalysisSummary) -> Self {
        Self {
            status: "success",
            message: SUCCESS_MESSAGE.to_string(),
            features,
            matches: placeholder_matches(),
            matches_placeholder: true,
            analysis,
        }
    }
}
