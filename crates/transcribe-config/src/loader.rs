//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, TranscribeConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from, for diagnostics/logging.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub file: Option<PathBuf>,
    pub env_overrides: Vec<String>,
}

/// Load configuration: compiled defaults, then `./transcribe.toml` if
/// present, then `TRANSCRIBE_*` environment variables.
pub fn load() -> Result<(TranscribeConfig, ConfigSources), ConfigError> {
    load_from(Path::new("transcribe.toml"))
}

/// Load configuration from a specific file path (if it exists), then apply
/// environment overrides.
pub fn load_from(path: &Path) -> Result<(TranscribeConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: TranscribeConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        sources.file = Some(path.to_path_buf());
        config
    } else {
        TranscribeConfig::default()
    };

    apply_env_overrides(&mut config, &mut sources);

    Ok((config, sources))
}

macro_rules! env_override {
    ($config:expr, $sources:expr, $env_var:literal, $field:ident) => {
        if let Ok(v) = env::var($env_var) {
            if let Ok(parsed) = v.parse() {
                $config.$field = parsed;
                $sources.env_overrides.push($env_var.to_string());
            }
        }
    };
}

/// Apply `TRANSCRIBE_*` environment variable overrides to a config.
pub fn apply_env_overrides(config: &mut TranscribeConfig, sources: &mut ConfigSources) {
    env_override!(config, sources, "TRANSCRIBE_CONFIDENCE_THRESHOLD", confidence_threshold);
    env_override!(config, sources, "TRANSCRIBE_ENERGY_PERCENTILE", energy_percentile);
    env_override!(config, sources, "TRANSCRIBE_PITCH_MEDIAN_WINDOW", pitch_median_window);
    env_override!(config, sources, "TRANSCRIBE_VIBRATO_SMOOTH_WINDOW", vibrato_smooth_window);
    env_override!(config, sources, "TRANSCRIBE_VIBRATO_EXTENT_CENTS", vibrato_extent_cents);
    env_override!(config, sources, "TRANSCRIBE_NOTE_MERGE_MAX_GAP", note_merge_max_gap);
    env_override!(config, sources, "TRANSCRIBE_POST_MERGE_MIN_DURATION", post_merge_min_duration);
    env_override!(config, sources, "TRANSCRIBE_ONSET_LOOKBACK_FRAMES", onset_lookback_frames);
    env_override!(config, sources, "TRANSCRIBE_KEY_WINDOW_SECONDS", key_window_seconds);
    env_override!(config, sources, "TRANSCRIBE_KEY_OVERLAP_SECONDS", key_overlap_seconds);
    env_override!(config, sources, "TRANSCRIBE_KEY_OUTLIER_MAX_DURATION", key_outlier_max_duration);
    env_override!(config, sources, "TRANSCRIBE_KEY_OUTLIER_MAX_CONFIDENCE", key_outlier_max_confidence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let (config, sources) = load_from(Path::new("/nonexistent/transcribe.toml")).unwrap();
        assert_eq!(config, TranscribeConfig::default());
        assert!(sources.file.is_none());
    }

    #[test]
    fn loads_and_tracks_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = 0.9").unwrap();

        let (config, sources) = load_from(file.path()).unwrap();
        assert_eq!(config.confidence_threshold, 0.9);
        assert_eq!(sources.file, Some(file.path().to_path_buf()));
    }

    #[test]
    fn env_override_wins_over_file_and_is_tracked() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = 0.9").unwrap();

        env::set_var("TRANSCRIBE_CONFIDENCE_THRESHOLD", "0.33");
        let (config, sources) = load_from(file.path()).unwrap();
        env::remove_var("TRANSCRIBE_CONFIDENCE_THRESHOLD");

        assert_eq!(config.confidence_threshold, 0.33);
        assert!(sources.env_overrides.contains(&"TRANSCRIBE_CONFIDENCE_THRESHOLD".to_string()));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = not_a_number").unwrap();
        let err = load_from(file.path());
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }
}
