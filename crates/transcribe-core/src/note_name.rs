//! Conversions between Hz, MIDI note numbers, and scientific pitch names.

use crate::error::{Error, Result};

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// `MIDI = 69 + 12 * log2(frequency / 440)`, rounded and clamped to `[0, 127]`.
///
/// 69 is A4 (440 Hz). Rounding is "round half away from zero" via `f64::round`,
/// matching Python's `int(round(x))` for the positive range this function
/// operates in.
pub fn hz_to_midi(frequency_hz: f64) -> u8 {
    let midi = 69.0 + 12.0 * (frequency_hz / 440.0).log2();
    midi.round().clamp(0.0, 127.0) as u8
}

/// Inverse of [`hz_to_midi`]: `frequency = 440 * 2^((midi - 69) / 12)`.
pub fn midi_to_hz(midi_number: u8) -> f64 {
    440.0 * 2f64.powf((midi_number as f64 - 69.0) / 12.0)
}

/// Scientific pitch notation, e.g. `midi_to_note_name(69) == "A4"`,
/// `midi_to_note_name(70) == "A#4"`. Octave numbering follows the MIDI
/// convention where middle C (60) is `C4`.
pub fn midi_to_note_name(midi_number: u8) -> String {
    let octave = (midi_number as i32 / 12) - 1;
    let name = NOTE_NAMES_SHARP[(midi_number % 12) as usize];
    format!("{name}{octave}")
}

/// Inverse of [`midi_to_note_name`]. Accepts both sharp (`C#4`) and flat
/// (`Db4`) spellings, case-insensitively. Not required by the core pipeline
/// but a small, obviously-useful enrichment for callers and tests.
pub fn note_name_to_midi(note_name: &str) -> Result<u8> {
    let trimmed = note_name.trim();
    if trimmed.len() < 2 || trimmed.len() > 4 {
        return Err(Error::InvalidInput(format!(
            "invalid note name: {note_name}"
        )));
    }

    let upper = trimmed.to_uppercase();
    let bytes = upper.as_bytes();

    let (letter_len, pitch_class) = if bytes.len() >= 2 && matches!(bytes[1], b'#' | b'B') {
        let pc = match &upper[0..2] {
            "C#" => 1,
            "DB" => 1,
            "D#" => 3,
            "EB" => 3,
            "F#" => 6,
            "GB" => 6,
            "G#" => 8,
            "AB" => 8,
            "A#" => 10,
            "BB" => 10,
            other => {
                return Err(Error::InvalidInput(format!("unrecognized note: {other}")));
            }
        };
        (2, pc)
    } else {
        let pc = match bytes[0] {
            b'C' => 0,
            b'D' => 2,
            b'E' => 4,
            b'F' => 5,
            b'G' => 7,
            b'A' => 9,
            b'B' => 11,
            other => {
                return Err(Error::InvalidInput(format!(
                    "unrecognized note letter: {}",
                    other as char
                )));
            }
        };
        (1, pc)
    };

    let octave_str = &upper[letter_len..];
    let octave: i32 = octave_str
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid octave: {octave_str}")))?;

    let midi = (octave + 1) * 12 + pitch_class;
    if !(0..=127).contains(&midi) {
        return Err(Error::InvalidInput(format!(
            "note out of MIDI range: {note_name} (midi {midi})"
        )));
    }

    Ok(midi as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a4_is_69() {
        assert_eq!(hz_to_midi(440.0), 69);
        assert_eq!(midi_to_hz(69), 440.0);
    }

    #[test]
    fn c4_is_60() {
        assert_eq!(hz_to_midi(261.6255653005986), 60);
        assert_eq!(midi_to_note_name(60), "C4");
    }

    #[test]
    fn sharp_naming() {
        assert_eq!(midi_to_note_name(70), "A#4");
    }

    #[test]
    fn hz_midi_round_trip_for_all_notes() {
        for m in 0..=127u8 {
            let hz = midi_to_hz(m);
            assert_eq!(hz_to_midi(hz), m, "round trip failed for midi {m}");
        }
    }

    #[test]
    fn note_name_round_trip() {
        for m in 0..=127u8 {
            let name = midi_to_note_name(m);
            assert_eq!(note_name_to_midi(&name).unwrap(), m);
        }
    }

    #[test]
    fn flat_spelling_resolves_same_pitch_class() {
        assert_eq!(note_name_to_midi("Bb4").unwrap(), note_name_to_midi("A#4").unwrap());
    }
}
