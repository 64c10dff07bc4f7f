//! Stage 1 (Preprocess) and Stage 2 (Frame Energy).

use crate::types::EnergyFrame;

/// Hop size in samples for a 10 ms frame at the pipeline's fixed 16 kHz
/// sample rate.
pub const HOP_SAMPLES: usize = 160;
pub const HOP_SECONDS: f64 = 0.01;
const SAMPLE_RATE: usize = 16_000;

/// `top_db` threshold for silence trimming, relative to the signal peak.
const TOP_DB: f64 = 30.0;

/// Peak-normalize and trim leading/trailing silence.
///
/// Returns the trimmed samples and the number of seconds of leading silence
/// removed (`trim_offset_s`), which downstream stages add back to every
/// timestamp to keep notes in the original (pre-trim) time base.
pub fn preprocess(samples: &[f32]) -> (Vec<f32>, f64) {
    if samples.is_empty() {
        return (Vec::new(), 0.0);
    }

    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    let normalized: Vec<f32> = if peak > 0.0 {
        samples.iter().map(|&s| s / peak).collect()
    } else {
        samples.to_vec()
    };

    let (start, end) = trim_range(&normalized, TOP_DB);
    let trimmed = normalized[start..end].to_vec();
    let trim_offset_s = start as f64 / SAMPLE_RATE as f64;

    (trimmed, trim_offset_s)
}

/// Find `[start, end)` such that every sample outside it is below
/// `-top_db` dBFS relative to the signal's peak (which is 1.0 after
/// normalization), using short-time frame energy — equivalent to
/// `librosa.effects.trim`'s default behavior.
fn trim_range(samples: &[f32], top_db: f64) -> (usize, usize) {
    if samples.is_empty() {
        return (0, 0);
    }

    // librosa.effects.trim uses a 2048-sample analysis frame with a 512
    // hop by default; frame-level energy below `-top_db` dBFS is silence.
    const FRAME_LENGTH: usize = 2048;
    const HOP_LENGTH: usize = 512;

    let threshold_amplitude = 10f64.powf(-top_db / 20.0) as f32;

    let n = samples.len();
    let frame_len = FRAME_LENGTH.min(n.max(1));
    let mut non_silent_frames = Vec::new();
    let mut frame_start = 0usize;
    while frame_start < n {
        let frame_end = (frame_start + frame_len).min(n);
        let frame = &samples[frame_start..frame_end];
        let rms = rms_of(frame);
        if rms > threshold_amplitude {
            non_silent_frames.push((frame_start, frame_end));
        }
        if frame_end == n {
            break;
        }
        frame_start += HOP_LENGTH;
    }

    match (non_silent_frames.first(), non_silent_frames.last()) {
        (Some(&(first_start, _)), Some(&(_, last_end))) => (first_start, last_end),
        _ => (0, 0),
    }
}

fn rms_of(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum_sq / frame.len() as f64).sqrt()) as f32
}

/// Stage 2: per-frame RMS energy at the same 10 ms hop as pitch frames.
///
/// Produces `N / hop + 1` frames — one more than `⌈N/hop⌉` when `N` is an
/// exact multiple of `hop`, where the extra frame is empty-padded; the
/// tail frame is padded with whatever samples remain.
pub fn compute_frame_energy(samples: &[f32]) -> Vec<EnergyFrame> {
    let n_frames = samples.len() / HOP_SAMPLES + 1;
    let mut frames = Vec::with_capacity(n_frames);

    for i in 0..n_frames {
        let start = i * HOP_SAMPLES;
        let end = (start + HOP_SAMPLES).min(samples.len());
        let rms = if end > start {
            rms_of(&samples[start..end]) as f64
        } else {
            0.0
        };
        frames.push(EnergyFrame {
            time_s: i as f64 * HOP_SECONDS,
            rms,
        });
    }

    frames
}

/// Adaptive energy threshold: floored at 0.005 so a fully
/// silent input never admits frames, and capped at 10% of the median so a
/// loud input can't set a threshold that suppresses the whole signal.
pub fn energy_threshold(energy: &[EnergyFrame], percentile: f64) -> f64 {
    if energy.is_empty() {
        return 0.005;
    }

    let mut values: Vec<f64> = energy.iter().map(|f| f.rms).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let p = percentile_of_sorted(&values, percentile);
    let med = percentile_of_sorted(&values, 50.0);
    let cap = med * 0.1;

    p.min(cap).max(0.005)
}

/// Linear-interpolation percentile, matching `numpy.percentile`'s default
/// (`linear`) interpolation method.
fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (percentile / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
