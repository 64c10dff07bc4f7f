//! Stage 6 (Onset Refine).
//!
//! Back-dates each note's start to the nearest local peak of the energy
//! derivative within a short lookback window, without ever overlapping the
//! previous (already-refined) note.

use crate::types::{EnergyFrame, Note};

const HOP_SECONDS: f64 = 0.01;

pub fn refine_onsets(notes: Vec<Note>, energy: &[EnergyFrame], trim_offset_s: f64, lookback_frames: usize) -> Vec<Note> {
    if energy.is_empty() {
        return notes;
    }

    let derivative = energy_derivative(energy);
    let mut refined: Vec<Note> = Vec::with_capacity(notes.len());
    let mut previous_end: Option<f64> = None;

    for note in notes {
        let frame_idx = (((note.start_time_s - trim_offset_s) / HOP_SECONDS).round() as isize)
            .clamp(0, derivative.len() as isize - 1) as usize;

        let lo = frame_idx.saturating_sub(lookback_frames);
        let onset_frame = (lo..=frame_idx)
            .max_by(|&a, &b| derivative[a].partial_cmp(&derivative[b]).unwrap())
            .unwrap_or(frame_idx);

        let mut new_start = round4(onset_frame as f64 * HOP_SECONDS + trim_offset_s);

        if let Some(prev_end) = previous_end {
            new_start = new_start.max(prev_end);
        }

        let note = if new_start <= note.start_time_s {
            let new_duration = round4(note.end_time_s() - new_start);
            if new_duration > 0.0 {
                Note::new(
                    note.midi_number,
                    new_start,
                    new_duration,
                    note.frequency_hz,
                    note.confidence,
                    note.energy,
                )
                .unwrap_or(note)
            } else {
                note
            }
        } else {
            note
        };

        previous_end = Some(note.end_time_s());
        refined.push(note);
    }

    refined
}

/// `D[i] = E[i] - E[i-1]`, `D[0] = 0`.
fn energy_derivative(energy: &[EnergyFrame]) -> Vec<f64> {
    let mut d = vec![0.0; energy.len()];
    for i in 1..energy.len() {
        d[i] = energy[i].rms - energy[i - 1].rms;
    }
    d
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(midi: u8, start: f64, dur: f64) -> Note {
        Note::new(midi, start, dur, 440.0, 0.9, None).unwrap()
    }

    fn energy_with_spike(n: usize, spike_at: usize) -> Vec<EnergyFrame> {
        (0..n)
            .map(|i| EnergyFrame {
                time_s: i as f64 * HOP_SECONDS,
                rms: if i == spike_at { 0.5 } else { 0.05 },
            })
            .collect()
    }

    #[test]
    fn backdates_to_energy_rise_within_lookback() {
        // Note reported to start at frame 10; true onset (biggest energy
        // jump) is 3 frames earlier, within the 5-frame lookback.
        let energy = energy_with_spike(30, 7);
        let notes = vec![note(69, 0.10, 0.5)];
        let refined = refine_onsets(notes, &energy, 0.0, 5);
        assert!((refined[0].start_time_s - 0.07).abs() < 1e-9);
    }

    #[test]
    fn never_overlaps_previous_refined_note() {
        let energy = energy_with_spike(40, 5);
        let notes = vec![note(69, 0.20, 0.1), note(72, 0.21, 0.3)];
        let refined = refine_onsets(notes, &energy, 0.0, 5);
        assert!(refined[1].start_time_s >= refined[0].end_time_s());
    }

    #[test]
    fn rejects_refinement_that_would_forward_date() {
        // Flat energy: the only local max in [lo, idx] is idx itself, so
        // the new start equals the reported start — never forward-dates.
        let energy = vec![
            EnergyFrame { time_s: 0.0, rms: 0.1 },
            EnergyFrame { time_s: 0.01, rms: 0.1 },
            EnergyFrame { time_s: 0.02, rms: 0.1 },
        ];
        let notes = vec![note(69, 0.01, 0.1)];
        let refined = refine_onsets(notes, &energy, 0.0, 5);
        assert!(refined[0].start_time_s <= 0.01 + 1e-9);
    }

    #[test]
    fn empty_energy_leaves_notes_untouched() {
        let notes = vec![note(69, 0.01, 0.1)];
        let refined = refine_onsets(notes.clone(), &[], 0.0, 5);
        assert_eq!(refined, notes);
    }
}
