//! Test Helper Utilities
//!
//! Shared utilities for testing tsi-identify

#![allow(dead_code)]

pub mod audio_generator;
pub mod multipart;

pub use audio_generator::{
    generate_test_wav, generate_test_wav_bytes, silent_wav_with_rate, ToneConfig,
};
pub use multipart::{multipart_body, Part};

use std::path::Path;

/// Number of entries left in a directory
pub fn dir_entry_count(path: &Path) -> usize {
    std::fs::read_dir(path).map(|d| d.count()).unwrap_or(0)
}
