//! Stage 5 (Merge Same-Pitch).

use crate::types::Note;

/// Fuse adjacent same-pitch notes separated by a gap no larger than
/// `max_gap_s`. Weighted averages (by duration, including the fused gap in
/// the denominator) bias frequency/confidence/energy toward the longer
/// constituent note.
pub fn merge_same_pitch(notes: Vec<Note>, max_gap_s: f64) -> Vec<Note> {
    let mut merged: Vec<Note> = Vec::with_capacity(notes.len());

    for cur in notes {
        if let Some(prev) = merged.last() {
            let gap = cur.start_time_s - prev.end_time_s();
            if cur.midi_number == prev.midi_number && gap >= 0.0 && gap <= max_gap_s {
                let fused = fuse(merged.pop().unwrap(), cur, gap);
                merged.push(fused);
                continue;
            }
        }
        merged.push(cur);
    }

    merged
}

fn fuse(prev: Note, cur: Note, gap: f64) -> Note {
    let total_dur = prev.duration_s + cur.duration_s + gap;
    let w_prev = prev.duration_s / total_dur;
    let w_cur = cur.duration_s / total_dur;

    let frequency_hz = prev.frequency_hz * w_prev + cur.frequency_hz * w_cur;
    let confidence = prev.confidence * w_prev + cur.confidence * w_cur;

    let energy = match (prev.energy, cur.energy) {
        (Some(pe), Some(ce)) => Some(pe * w_prev + ce * w_cur),
        (Some(pe), None) => Some(pe),
        (None, Some(ce)) => Some(ce),
        (None, None) => None,
    };

    // Note::new can't fail here: midi/start/duration/confidence were all
    // already valid on the constituent notes and remain within range after
    // a convex combination.
    Note::new(
        prev.midi_number,
        prev.start_time_s,
        total_dur,
        frequency_hz,
        confidence,
        energy,
    )
    .expect("fused note invariants follow from valid constituent notes")
}
