//! Pipeline orchestration: chains the eight stages into a single entry
//! point. Single-threaded, synchronous, and pure: no I/O, no shared state.

use crate::error::{Error, Result};
use crate::filter::{filter_short_notes, MIN_FILTERED_DURATION_S};
use crate::key::{filter_by_key, KeyFilterConfig};
use crate::merge::merge_same_pitch;
use crate::onset::refine_onsets;
use crate::pitch_post::{post_process_pitch, PitchPostProcessConfig};
use crate::preprocess::{compute_frame_energy, energy_threshold, preprocess};
use crate::segment::{segment_notes, SegmentConfig};
use crate::types::{Note, PitchFrame, SectionKey};

/// All tunable knobs, gathered in one place so a caller (CLI,
/// config file loader) only has to thread one value through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub confidence_threshold: f64,
    pub energy_percentile: f64,
    pub pitch_median_window: usize,
    pub vibrato_smooth_window: usize,
    pub vibrato_extent_cents: f64,
    pub note_merge_max_gap_s: f64,
    pub post_merge_min_duration_s: f64,
    pub onset_lookback_frames: usize,
    pub key_window_seconds: f64,
    pub key_overlap_seconds: f64,
    pub key_outlier_max_duration_s: f64,
    pub key_outlier_max_confidence: f64,
    /// Run the key-filter stage at all. Short clips with too little
    /// content for even one window naturally skip it, but callers
    /// may also disable it outright.
    pub enable_key_filter: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            energy_percentile: 15.0,
            pitch_median_window: 5,
            vibrato_smooth_window: 13,
            vibrato_extent_cents: 120.0,
            note_merge_max_gap_s: 0.08,
            post_merge_min_duration_s: MIN_FILTERED_DURATION_S,
            onset_lookback_frames: 5,
            key_window_seconds: 8.0,
            key_overlap_seconds: 4.0,
            key_outlier_max_duration_s: 0.15,
            key_outlier_max_confidence: 0.65,
            enable_key_filter: true,
        }
    }
}

/// The full result of a transcription run: the note list plus any detected
/// tonal sections (empty when key filtering found no usable window).
#[derive(Debug, Clone, Default)]
pub struct TranscriptionResult {
    pub notes: Vec<Note>,
    pub key_sections: Vec<SectionKey>,
}

/// Run the full eight-stage pipeline.
///
/// `samples` is the raw mono waveform at 16 kHz; `pitch_frames` is the
/// externally-supplied estimator output, already aligned to the
/// *trimmed* audio returned by preprocessing — callers are expected to
/// preprocess once, hand the trimmed samples to the estimator, and pass the
/// resulting frames here alongside the same samples.
#[tracing::instrument(skip(samples, pitch_frames), fields(n_samples = samples.len(), n_frames = pitch_frames.len()))]
pub fn transcribe(samples: &[f32], pitch_frames: &[PitchFrame], config: &PipelineConfig) -> Result<TranscriptionResult> {
    if samples.is_empty() {
        return Err(Error::InvalidInput("audio buffer is empty".into()));
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(Error::InvalidInput("audio buffer contains non-finite samples".into()));
    }

    let (trimmed, trim_offset_s) = preprocess(samples);
    if trimmed.is_empty() {
        tracing::info!("preprocessing trimmed the entire clip as silence");
        return Ok(TranscriptionResult::default());
    }

    let energy = compute_frame_energy(&trimmed);
    let energy_gate = energy_threshold(&energy, config.energy_percentile);

    let pitch_post_config = PitchPostProcessConfig {
        median_window: config.pitch_median_window,
        vibrato_smooth_window: config.vibrato_smooth_window,
        vibrato_extent_cents: config.vibrato_extent_cents,
    };
    let processed_frames = post_process_pitch(pitch_frames, &pitch_post_config);

    let segment_config = SegmentConfig {
        confidence_threshold: config.confidence_threshold,
        energy_threshold: energy_gate,
    };
    let notes = segment_notes(&processed_frames, &energy, &segment_config, trim_offset_s);
    tracing::debug!(n_notes = notes.len(), "segmentation complete");

    let notes = merge_same_pitch(notes, config.note_merge_max_gap_s);
    let notes = refine_onsets(notes, &energy, trim_offset_s, config.onset_lookback_frames);
    let notes = filter_short_notes(notes, config.post_merge_min_duration_s);

    let (notes, key_sections) = if config.enable_key_filter {
        filter_by_key(
            notes,
            &KeyFilterConfig {
                window_s: config.key_window_seconds,
                overlap_s: config.key_overlap_seconds,
                outlier_max_duration_s: config.key_outlier_max_duration_s,
                outlier_max_confidence: config.key_outlier_max_confidence,
            },
        )
    } else {
        (notes, Vec::new())
    };

    tracing::info!(n_notes = notes.len(), n_key_sections = key_sections.len(), "transcription complete");

    Ok(TranscriptionResult { notes, key_sections })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frames(seconds: f64, freq: f64) -> Vec<PitchFrame> {
        let n = (seconds / 0.01).round() as usize;
        (0..n)
            .map(|i| PitchFrame {
                time_s: i as f64 * 0.01,
                frequency_hz: freq,
                confidence: 0.95,
            })
            .collect()
    }

    fn sine_samples(seconds: f64, freq: f64) -> Vec<f32> {
        let sr = 16_000;
        let n = (seconds * sr as f64).round() as usize;
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sr as f64).sin() as f32 * 0.8)
            .collect()
    }

    #[test]
    fn rejects_empty_audio() {
        let err = transcribe(&[], &[], &PipelineConfig::default());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_non_finite_samples() {
        let samples = vec![0.1, f32::NAN, 0.2];
        let err = transcribe(&samples, &[], &PipelineConfig::default());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn pure_tone_produces_one_note() {
        let samples = sine_samples(2.0, 440.0);
        let frames = sine_frames(2.0, 440.0);
        let result = transcribe(&samples, &frames, &PipelineConfig::default()).unwrap();
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].midi_number, 69);
        assert!(result.notes[0].frequency_hz > 435.0 && result.notes[0].frequency_hz < 445.0);
    }

    #[test]
    fn all_silence_produces_no_notes() {
        let samples = vec![0.0f32; 16_000];
        let result = transcribe(&samples, &[], &PipelineConfig::default()).unwrap();
        assert!(result.notes.is_empty());
        assert!(result.key_sections.is_empty());
    }

    #[test]
    fn notes_are_strictly_ordered_by_start_time() {
        let mut samples = sine_samples(1.0, 440.0);
        samples.extend(sine_samples(1.0, 523.25));
        let mut frames = sine_frames(1.0, 440.0);
        frames.extend(sine_frames(1.0, 523.25).into_iter().map(|f| PitchFrame {
            time_s: f.time_s + 1.0,
            ..f
        }));

        let result = transcribe(&samples, &frames, &PipelineConfig::default()).unwrap();
        for pair in result.notes.windows(2) {
            assert!(pair[0].start_time_s < pair[1].start_time_s);
            assert!(pair[1].start_time_s >= pair[0].end_time_s());
        }
    }
}
