//! Configuration loading for the transcription pipeline.
//!
//! This crate provides configuration loading with minimal dependencies,
//! designed to be imported by every pipeline crate without causing circular
//! dependency issues.
//!
//! # Config file locations
//!
//! Files are loaded in order (later wins):
//! 1. `./transcribe.toml` (local override)
//! 2. Environment variables (`TRANSCRIBE_*`)
//!
//! # Example config
//!
//! ```toml
//! confidence_threshold = 0.5
//! energy_percentile = 15.0
//! note_merge_max_gap = 0.08
//! key_window_seconds = 8.0
//! ```

mod loader;

pub use loader::{load, load_from, ConfigSources};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Every tunable knob in the pipeline, with the reference
/// defaults as `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    pub confidence_threshold: f64,
    pub energy_percentile: f64,
    pub pitch_median_window: usize,
    pub vibrato_smooth_window: usize,
    pub vibrato_extent_cents: f64,
    pub note_merge_max_gap: f64,
    pub post_merge_min_duration: f64,
    pub onset_lookback_frames: usize,
    pub key_window_seconds: f64,
    pub key_overlap_seconds: f64,
    pub key_outlier_max_duration: f64,
    pub key_outlier_max_confidence: f64,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            energy_percentile: 15.0,
            pitch_median_window: 5,
            vibrato_smooth_window: 13,
            vibrato_extent_cents: 120.0,
            note_merge_max_gap: 0.08,
            post_merge_min_duration: 0.06,
            onset_lookback_frames: 5,
            key_window_seconds: 8.0,
            key_overlap_seconds: 4.0,
            key_outlier_max_duration: 0.15,
            key_outlier_max_confidence: 0.65,
        }
    }
}
