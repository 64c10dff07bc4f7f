//! JSON report shape. Only compiled with the `serialization`
//! feature; the pipeline itself has no notion of JSON.

use crate::pipeline::TranscriptionResult;
use crate::types::{KeyMode, Note, SectionKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub start_time: f64,
    pub end_time: f64,
    pub key: String,
    pub tonic: u8,
    pub mode: KeyMode,
    pub correlation: f64,
}

impl From<&SectionKey> for KeyInfo {
    fn from(section: &SectionKey) -> Self {
        Self {
            start_time: section.start_time_s,
            end_time: section.end_time_s,
            key: format!("{} {}", pitch_class_name(section.tonic), section.mode),
            tonic: section.tonic,
            mode: section.mode,
            correlation: section.correlation,
        }
    }
}

fn pitch_class_name(pitch_class: u8) -> &'static str {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    NAMES[(pitch_class % 12) as usize]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub input_file: Option<String>,
    pub audio_duration: f64,
    pub model_size: ModelSize,
    pub confidence_threshold: f64,
    pub notes_detected: usize,
    pub processed_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_info: Vec<KeyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteReport {
    pub midi_number: u8,
    pub note_name: String,
    pub start_time: f64,
    pub duration: f64,
    pub end_time: f64,
    pub frequency: f64,
    pub confidence: f64,
    pub velocity: u8,
}

impl From<&Note> for NoteReport {
    fn from(note: &Note) -> Self {
        Self {
            midi_number: note.midi_number,
            note_name: note.note_name.clone(),
            start_time: note.start_time_s,
            duration: note.duration_s,
            end_time: note.end_time_s(),
            frequency: note.frequency_hz,
            confidence: note.confidence,
            velocity: note.velocity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: Metadata,
    pub notes: Vec<NoteReport>,
}

/// Assemble the output report shape for a completed transcription run.
pub fn build_report(
    result: &TranscriptionResult,
    input_file: Option<String>,
    audio_duration_s: f64,
    model_size: ModelSize,
    confidence_threshold: f64,
) -> Report {
    let key_info = result.key_sections.iter().map(KeyInfo::from).collect();

    Report {
        metadata: Metadata {
            input_file,
            audio_duration: round2(audio_duration_s),
            model_size,
            confidence_threshold,
            notes_detected: result.notes.len(),
            processed_at: chrono::Utc::now(),
            key_info,
        },
        notes: result.notes.iter().map(NoteReport::from).collect(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
