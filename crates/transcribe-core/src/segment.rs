//! Stage 4 (Segment).
//!
//! Models note emission as an explicit state machine rather than
//! loop-carried sentinel values.

use crate::note_name::hz_to_midi;
use crate::types::{EnergyFrame, Note, PitchFrame};

const MIN_FREQUENCY_HZ: f64 = 80.0;
const MIN_NOTE_DURATION_S: f64 = 0.05;
pub const HOP_SECONDS: f64 = 0.01;

pub struct SegmentConfig {
    pub confidence_threshold: f64,
    pub energy_threshold: f64,
}

/// A candidate note under construction.
struct InNote {
    midi: u8,
    start_time_s: f64,
    freqs: Vec<f64>,
    confs: Vec<f64>,
    energies: Vec<f64>,
}

enum State {
    Idle,
    InNote(InNote),
}

/// Segment pitch frames into candidate notes, gated by energy, confidence,
/// and a minimum detectable frequency.
///
/// `trim_offset_s` is added to every emitted note's `start_time_s` so notes
/// are reported in the original (pre-trim) time base.
pub fn segment_notes(
    frames: &[PitchFrame],
    energy: &[EnergyFrame],
    config: &SegmentConfig,
    trim_offset_s: f64,
) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut state = State::Idle;

    for (i, frame) in frames.iter().enumerate() {
        // A frame with no matching energy entry is treated as valid for
        // that criterion: "has_energy" defaults true when the energy array
        // is shorter than the frame list.
        let has_energy = energy
            .get(i)
            .map(|e| e.rms > config.energy_threshold)
            .unwrap_or(true);

        let valid = frame.frequency_hz > MIN_FREQUENCY_HZ
            && frame.confidence >= config.confidence_threshold
            && has_energy;

        state = if valid {
            let midi = hz_to_midi(frame.frequency_hz);
            match state {
                State::Idle => State::InNote(InNote {
                    midi,
                    start_time_s: frame.time_s,
                    freqs: vec![frame.frequency_hz],
                    confs: vec![frame.confidence],
                    energies: vec![energy.get(i).map(|e| e.rms).unwrap_or(0.0)],
                }),
                State::InNote(mut note) if note.midi == midi => {
                    note.freqs.push(frame.frequency_hz);
                    note.confs.push(frame.confidence);
                    note.energies.push(energy.get(i).map(|e| e.rms).unwrap_or(0.0));
                    State::InNote(note)
                }
                State::InNote(note) => {
                    emit(&mut notes, note, frame.time_s, trim_offset_s);
                    State::InNote(InNote {
                        midi,
                        start_time_s: frame.time_s,
                        freqs: vec![frame.frequency_hz],
                        confs: vec![frame.confidence],
                        energies: vec![energy.get(i).map(|e| e.rms).unwrap_or(0.0)],
                    })
                }
            }
        } else {
            match state {
                State::InNote(note) => {
                    emit(&mut notes, note, frame.time_s, trim_offset_s);
                    State::Idle
                }
                State::Idle => State::Idle,
            }
        };
    }

    if let State::InNote(note) = state {
        let end = frames.last().map(|f| f.time_s).unwrap_or(0.0) + HOP_SECONDS;
        emit(&mut notes, note, end, trim_offset_s);
    }

    notes
}

fn emit(notes: &mut Vec<Note>, note: InNote, end_time_s: f64, trim_offset_s: f64) {
    let duration = end_time_s - note.start_time_s;
    if duration < MIN_NOTE_DURATION_S || note.freqs.is_empty() {
        return;
    }

    let avg_freq = note.freqs.iter().sum::<f64>() / note.freqs.len() as f64;
    let avg_conf = note.confs.iter().sum::<f64>() / note.confs.len() as f64;

    let has_any_energy = note.energies.iter().any(|&e| e != 0.0);
    let avg_energy = if has_any_energy {
        Some(note.energies.iter().sum::<f64>() / note.energies.len() as f64)
    } else {
        None
    };

    let start = round4(note.start_time_s + trim_offset_s);

    // A candidate reaching this point already satisfies every Note
    // invariant (positive duration, frequency above the voiced floor,
    // confidence averaged from in-range values): a construction failure
    // here is a bug in this stage, not a recoverable input error.
    let n = Note::new(note.midi, start, round4(duration), avg_freq, avg_conf, avg_energy)
        .expect("segmented candidate satisfies Note invariants by construction");
    notes.push(n);
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(t: f64, f: f64, c: f64) -> PitchFrame {
        PitchFrame {
            time_s: t,
            frequency_hz: f,
            confidence: c,
        }
    }

    fn energy_always_above() -> Vec<EnergyFrame> {
        Vec::new() // absent energy entries default to "valid"
    }

    #[test]
    fn empty_frames_produce_no_notes() {
        let config = SegmentConfig {
            confidence_threshold: 0.5,
            energy_threshold: 0.01,
        };
        assert!(segment_notes(&[], &[], &config, 0.0).is_empty());
    }

    #[test]
    fn single_sustained_pitch_is_one_note() {
        let frames: Vec<PitchFrame> = (0..200).map(|i| frame(i as f64 * 0.01, 440.0, 0.9)).collect();
        let config = SegmentConfig {
            confidence_threshold: 0.5,
            energy_threshold: 0.01,
        };
        let notes = segment_notes(&frames, &energy_always_above(), &config, 0.0);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].midi_number, 69);
        // 200 frames * 10ms + the asymmetric +0.01s tail on the final note.
        assert!((notes[0].duration_s - 2.01).abs() < 1e-6);
    }

    #[test]
    fn pitch_change_splits_into_two_notes() {
        let mut frames: Vec<PitchFrame> = (0..100).map(|i| frame(i as f64 * 0.01, 440.0, 0.9)).collect();
        frames.extend((100..200).map(|i| frame(i as f64 * 0.01, 523.25, 0.9)));
        let config = SegmentConfig {
            confidence_threshold: 0.5,
            energy_threshold: 0.01,
        };
        let notes = segment_notes(&frames, &energy_always_above(), &config, 0.0);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].midi_number, 69);
        assert_eq!(notes[1].midi_number, 72);
    }

    #[test]
    fn short_candidate_is_dropped() {
        let frames: Vec<PitchFrame> = (0..3).map(|i| frame(i as f64 * 0.01, 440.0, 0.9)).collect();
        let config = SegmentConfig {
            confidence_threshold: 0.5,
            energy_threshold: 0.01,
        };
        // 3 frames * 10ms + 0.01 tail = 0.04s < 0.05s minimum.
        let notes = segment_notes(&frames, &energy_always_above(), &config, 0.0);
        assert!(notes.is_empty());
    }

    #[test]
    fn low_confidence_frame_is_unvoiced() {
        let frames = vec![frame(0.0, 440.0, 0.1), frame(0.01, 440.0, 0.1)];
        let config = SegmentConfig {
            confidence_threshold: 0.5,
            energy_threshold: 0.01,
        };
        assert!(segment_notes(&frames, &energy_always_above(), &config, 0.0).is_empty());
    }

    #[test]
    fn trim_offset_shifts_start_time() {
        let frames: Vec<PitchFrame> = (0..20).map(|i| frame(i as f64 * 0.01, 440.0, 0.9)).collect();
        let config = SegmentConfig {
            confidence_threshold: 0.5,
            energy_threshold: 0.01,
        };
        let notes = segment_notes(&frames, &energy_always_above(), &config, 0.5);
        assert_eq!(notes[0].start_time_s, 0.5);
    }
}
