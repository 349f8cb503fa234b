//! Data models for tsi-identify

pub mod identify_response;

pub use identify_response::{
    placeholder_matches, AnalysisSummary, IdentifyResponse, SoundMatch, SUCCESS_MESSAGE,
};
