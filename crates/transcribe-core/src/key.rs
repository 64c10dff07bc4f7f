//! Stage 8 (Key Filter).
//!
//! Krumhansl-Schmuckler key induction over sliding windows, followed by a
//! diatonic-plus-neighbours outlier filter on the note list.

use crate::types::{KeyMode, Note, SectionKey};

const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

const MAJOR_INTERVALS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_INTERVALS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

pub struct KeyFilterConfig {
    pub window_s: f64,
    pub overlap_s: f64,
    pub outlier_max_duration_s: f64,
    pub outlier_max_confidence: f64,
}

impl Default for KeyFilterConfig {
    fn default() -> Self {
        Self {
            window_s: 8.0,
            overlap_s: 4.0,
            outlier_max_duration_s: 0.15,
            outlier_max_confidence: 0.65,
        }
    }
}

/// Detect per-window tonality and drop outlier notes. Returns the filtered
/// note list together with the windows' key annotations.
pub fn filter_by_key(notes: Vec<Note>, config: &KeyFilterConfig) -> (Vec<Note>, Vec<SectionKey>) {
    if notes.is_empty() {
        return (notes, Vec::new());
    }

    let sections = detect_sections(&notes, config);
    if sections.is_empty() {
        return (notes, sections);
    }

    let step = config.window_s - config.overlap_s;
    let filtered = notes
        .into_iter()
        .filter(|note| !is_outlier(note, &sections, config, step))
        .collect();

    (filtered, sections)
}

fn detect_sections(notes: &[Note], config: &KeyFilterConfig) -> Vec<SectionKey> {
    let first_start = notes
        .iter()
        .map(|n| n.start_time_s)
        .fold(f64::INFINITY, f64::min);
    let last_end = notes
        .iter()
        .map(|n| n.end_time_s())
        .fold(f64::NEG_INFINITY, f64::max);

    // A non-positive step (overlap_s >= window_s, both caller-tunable) would
    // otherwise never advance w_s and hang forever; fall back to a
    // non-overlapping stride of a full window.
    let mut step = config.window_s - config.overlap_s;
    if step <= 0.0 {
        step = config.window_s;
    }
    let mut sections = Vec::new();

    let mut w_s = first_start;
    while w_s < last_end {
        let w_e = w_s + config.window_s;

        let mut histogram = [0.0f64; 12];
        for note in notes {
            let overlap = (note.end_time_s().min(w_e) - note.start_time_s.max(w_s)).max(0.0);
            if overlap > 0.0 {
                histogram[(note.midi_number % 12) as usize] += overlap;
            }
        }

        let total: f64 = histogram.iter().sum();
        if total > 0.1 {
            if let Some((tonic, mode, correlation)) = best_key_candidate(&histogram) {
                sections.push(SectionKey {
                    start_time_s: w_s,
                    end_time_s: w_e.min(last_end),
                    tonic,
                    mode,
                    correlation,
                });
            }
        }

        w_s += step;
    }

    sections
}

/// Correlate a histogram against all 24 rotated key profiles. Ties are
/// broken by first encountered: tonic `0..11`, major before minor.
fn best_key_candidate(histogram: &[f64; 12]) -> Option<(u8, KeyMode, f64)> {
    let mut best: Option<(u8, KeyMode, f64)> = None;

    for tonic in 0u8..12 {
        let mut rotated = [0.0; 12];
        for i in 0..12 {
            rotated[i] = histogram[(i + tonic as usize) % 12];
        }

        for (mode, profile) in [(KeyMode::Major, &MAJOR_PROFILE), (KeyMode::Minor, &MINOR_PROFILE)] {
            let r = pearson(&rotated, profile);
            if r.is_nan() {
                continue;
            }
            if best.as_ref().map(|&(_, _, best_r)| r > best_r).unwrap_or(true) {
                best = Some((tonic, mode, r));
            }
        }
    }

    best.map(|(tonic, mode, r)| (tonic, mode, round4(((r + 1.0) / 2.0).clamp(0.0, 1.0))))
}

fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return f64::NAN;
    }
    num / denom
}

fn extended_set(mode: KeyMode) -> [bool; 12] {
    let base = match mode {
        KeyMode::Major => &MAJOR_INTERVALS,
        KeyMode::Minor => &MINOR_INTERVALS,
    };

    let mut set = [false; 12];
    for &interval in base {
        set[interval as usize] = true;
        set[((interval - 1).rem_euclid(12)) as usize] = true;
        set[((interval + 1).rem_euclid(12)) as usize] = true;
    }
    set
}

/// Find the best-correlated window overlapping `note`, then apply the
/// three-condition outlier rule.
fn is_outlier(note: &Note, sections: &[SectionKey], config: &KeyFilterConfig, _step: f64) -> bool {
    let overlapping = sections
        .iter()
        .filter(|s| note.start_time_s < s.end_time_s && note.end_time_s() > s.start_time_s)
        .max_by(|a, b| a.correlation.partial_cmp(&b.correlation).unwrap());

    let Some(section) = overlapping else {
        return false;
    };

    let pitch_class = (note.midi_number as i32 - section.tonic as i32).rem_euclid(12);
    let in_extended_set = extended_set(section.mode)[pitch_class as usize];

    !in_extended_set && note.duration_s < config.outlier_max_duration_s && note.confidence < config.outlier_max_confidence
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(midi: u8, start: f64, dur: f64, conf: f64) -> Note {
        Note::new(midi, start, dur, 440.0, conf, None).unwrap()
    }

    #[test]
    fn empty_notes_produce_no_sections() {
        let (notes, sections) = filter_by_key(Vec::new(), &KeyFilterConfig::default());
        assert!(notes.is_empty());
        assert!(sections.is_empty());
    }

    #[test]
    fn c_major_scale_is_detected_and_kept() {
        // C D E F G A B, each well inside the diatonic set of C major.
        let midis = [60, 62, 64, 65, 67, 69, 71];
        let notes: Vec<Note> = midis
            .iter()
            .enumerate()
            .map(|(i, &m)| note(m, i as f64, 0.9, 0.9))
            .collect();

        let (filtered, sections) = filter_by_key(notes, &KeyFilterConfig::default());
        assert_eq!(filtered.len(), 7);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].tonic, 0);
        assert_eq!(sections[0].mode, KeyMode::Major);
    }

    #[test]
    fn short_low_confidence_non_diatonic_note_is_dropped() {
        let mut notes: Vec<Note> = [60, 62, 64, 65, 67, 69, 71]
            .iter()
            .enumerate()
            .map(|(i, &m)| note(m, i as f64, 0.9, 0.9))
            .collect();
        // C# (pitch class 1) is outside C major's extended set, short and
        // low-confidence — should be dropped.
        notes.push(note(61, 7.0, 0.1, 0.2));

        let (filtered, _) = filter_by_key(notes, &KeyFilterConfig::default());
        assert!(!filtered.iter().any(|n| n.midi_number == 61));
    }

    #[test]
    fn non_diatonic_note_with_high_confidence_is_kept() {
        let mut notes: Vec<Note> = [60, 62, 64, 65, 67, 69, 71]
            .iter()
            .enumerate()
            .map(|(i, &m)| note(m, i as f64, 0.9, 0.9))
            .collect();
        notes.push(note(61, 7.0, 0.1, 0.9)); // high confidence survives
        let (filtered, _) = filter_by_key(notes, &KeyFilterConfig::default());
        assert!(filtered.iter().any(|n| n.midi_number == 61));
    }

    #[test]
    fn pearson_identical_arrays_is_one() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        assert!((pearson(&a, &a) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn sparse_window_below_threshold_is_discarded() {
        let notes = vec![note(60, 0.0, 0.05, 0.9)];
        let (_, sections) = filter_by_key(notes, &KeyFilterConfig::default());
        assert!(sections.is_empty());
    }

    #[test]
    fn overlap_at_least_window_does_not_hang() {
        // overlap_s >= window_s would make step <= 0; must still terminate
        // and fall back to a non-overlapping stride.
        let midis = [60, 62, 64, 65, 67, 69, 71];
        let notes: Vec<Note> = midis
            .iter()
            .enumerate()
            .map(|(i, &m)| note(m, i as f64, 0.9, 0.9))
            .collect();
        let config = KeyFilterConfig {
            window_s: 4.0,
            overlap_s: 4.0,
            ..KeyFilterConfig::default()
        };
        let (_, sections) = filter_by_key(notes, &config);
        assert!(!sections.is_empty());
    }

    #[test]
    fn final_window_end_time_is_clamped_to_last_note_end() {
        let midis = [60, 62, 64, 65, 67, 69, 71];
        let notes: Vec<Note> = midis
            .iter()
            .enumerate()
            .map(|(i, &m)| note(m, i as f64, 0.9, 0.9))
            .collect();
        let last_end = notes.last().unwrap().end_time_s();
        let (_, sections) = filter_by_key(notes, &KeyFilterConfig::default());
        assert!(sections.iter().all(|s| s.end_time_s <= last_end));
    }
}
