//! Core data model: pitch/energy frames, detected notes, and tonal sections.

use crate::error::{Error, Result};
use crate::note_name::midi_to_note_name;

#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// One 10 ms hop of pitch estimation, relative to the trimmed audio.
pub struct PitchFrame {
    /// Timestamp at the start of the frame, relative to the trimmed audio.
    pub time_s: f64,
    /// Detected frequency in Hz. 0.0 denotes unvoiced.
    pub frequency_hz: f64,
    /// Model periodicity / voicing confidence, in `[0, 1]`.
    pub confidence: f64,
}

/// Parallel array to `PitchFrame`: per-frame RMS energy.
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyFrame {
    pub time_s: f64,
    pub rms: f64,
}

/// Tonal mode of a detected key.
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", serde(rename_all = "snake_case"))]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// Tonal annotation for a sliding time window.
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SectionKey {
    pub start_time_s: f64,
    pub end_time_s: f64,
    /// Pitch class of the tonic, 0 = C.
    pub tonic: u8,
    pub mode: KeyMode,
    /// Normalized Pearson correlation, in `[0, 1]`.
    pub correlation: f64,
}

/// A detected musical event.
///
/// Constructed only through [`Note::new`], which enforces the invariants in
/// its invariants: `midi_number <= 127`, `duration_s > 0`, `confidence` and
/// `velocity` within their ranges. A violation means a bug in the stage that
/// produced the note, not a recoverable input error, so construction fails
/// loudly with [`Error::DomainViolation`].
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub midi_number: u8,
    pub note_name: String,
    /// Start time in the original (pre-trim) time base.
    pub start_time_s: f64,
    pub duration_s: f64,
    /// Duration-weighted average frequency across constituent frames.
    pub frequency_hz: f64,
    /// Mean confidence across constituent frames.
    pub confidence: f64,
    /// Mean RMS across constituent frames, when any frame supplied one.
    pub energy: Option<f64>,
    pub velocity: u8,
}

impl Note {
    /// Construct a note, computing `note_name` and `velocity`, validating
    /// every invariant above. `velocity` is derived from
    /// `energy` when present, falling back to `confidence`.
    pub fn new(
        midi_number: u8,
        start_time_s: f64,
        duration_s: f64,
        frequency_hz: f64,
        confidence: f64,
        energy: Option<f64>,
    ) -> Result<Self> {
        if midi_number > 127 {
            return Err(Error::DomainViolation(format!(
                "midi_number must be <= 127, got {midi_number}"
            )));
        }
        if duration_s <= 0.0 {
            return Err(Error::DomainViolation(format!(
                "note duration must be > 0, got {duration_s}"
            )));
        }
        if start_time_s < 0.0 {
            return Err(Error::DomainViolation(format!(
                "note start_time must be >= 0, got {start_time_s}"
            )));
        }
        if frequency_hz <= 0.0 {
            return Err(Error::DomainViolation(format!(
                "note frequency must be > 0, got {frequency_hz}"
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::DomainViolation(format!(
                "note confidence must be within [0, 1], got {confidence}"
            )));
        }

        let velocity = crate::velocity::assign_velocity(energy, confidence);

        Ok(Self {
            midi_number,
            note_name: midi_to_note_name(midi_number),
            start_time_s,
            duration_s,
            frequency_hz,
            confidence,
            energy,
            velocity,
        })
    }

    pub fn end_time_s(&self) -> f64 {
        self.start_time_s + self.duration_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_duration() {
        let err = Note::new(69, 0.0, 0.0, 440.0, 0.9, None);
        assert!(matches!(err, Err(Error::DomainViolation(_))));
    }

    #[test]
    fn rejects_midi_number_above_127() {
        let err = Note::new(128, 0.0, 1.0, 440.0, 0.9, None);
        assert!(matches!(err, Err(Error::DomainViolation(_))));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let err = Note::new(69, 0.0, 1.0, 440.0, 1.5, None);
        assert!(matches!(err, Err(Error::DomainViolation(_))));
    }

    #[test]
    fn computes_note_name_and_end_time() {
        let note = Note::new(70, 1.0, 0.5, 466.16, 0.9, Some(0.1)).unwrap();
        assert_eq!(note.note_name, "A#4");
        assert!((note.end_time_s() - 1.5).abs() < 1e-9);
    }
}
