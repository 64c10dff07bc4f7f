//! Stage 7 (Short-Note Filter).

use crate::types::Note;

/// Default minimum duration: notes shorter than this are considered
/// transcription noise, not deliberate musical events.
pub const MIN_FILTERED_DURATION_S: f64 = 0.06;

pub fn filter_short_notes(notes: Vec<Note>, min_duration_s: f64) -> Vec<Note> {
    notes.into_iter().filter(|n| n.duration_s >= min_duration_s).collect()
}
