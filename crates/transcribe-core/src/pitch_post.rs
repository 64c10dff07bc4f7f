//! Stage 3 (Pitch Post-Process).
//!
//! Segment-aware median filter to remove single-frame jitter, followed by
//! cent-space vibrato suppression. Both operate on contiguous frequency /
//! confidence arrays rather than the `PitchFrame` record type — the
//! per-frame record is assembled only at the stage boundary.

use crate::types::PitchFrame;

const MIN_VOICED_CONFIDENCE: f64 = 0.1;

pub struct PitchPostProcessConfig {
    pub median_window: usize,
    pub vibrato_smooth_window: usize,
    pub vibrato_extent_cents: f64,
}

impl Default for PitchPostProcessConfig {
    fn default() -> Self {
        Self {
            median_window: 5,
            vibrato_smooth_window: 13,
            vibrato_extent_cents: 120.0,
        }
    }
}

pub fn post_process_pitch(frames: &[PitchFrame], config: &PitchPostProcessConfig) -> Vec<PitchFrame> {
    if frames.len() < config.median_window {
        return frames.to_vec();
    }

    let confs: Vec<f64> = frames.iter().map(|f| f.confidence).collect();
    let mut freqs: Vec<f64> = frames.iter().map(|f| f.frequency_hz).collect();

    segmented_median_filter(&mut freqs, &confs, config.median_window);
    smooth_vibrato(
        &mut freqs,
        &confs,
        config.vibrato_smooth_window,
        config.vibrato_extent_cents,
    );

    frames
        .iter()
        .zip(freqs.iter())
        .map(|(f, &freq)| PitchFrame {
            time_s: f.time_s,
            frequency_hz: freq.max(0.0),
            confidence: f.confidence,
        })
        .collect()
}

fn is_voiced(freq: f64, conf: f64) -> bool {
    freq > 0.0 && conf > MIN_VOICED_CONFIDENCE
}

/// Maximal runs of `(frequency > 0 AND confidence > 0.1)` frames.
fn find_segments(freqs: &[f64], confs: &[f64]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut in_segment = false;
    let mut start = 0;

    for i in 0..freqs.len() {
        let voiced = is_voiced(freqs[i], confs[i]);
        if voiced && !in_segment {
            start = i;
            in_segment = true;
        } else if !voiced && in_segment {
            segments.push((start, i));
            in_segment = false;
        }
    }
    if in_segment {
        segments.push((start, freqs.len()));
    }

    segments
}

fn segmented_median_filter(freqs: &mut [f64], confs: &[f64], window: usize) {
    let segments = find_segments(freqs, confs);
    for (start, end) in segments {
        if end - start >= window {
            let filtered = median_filter_reflect(&freqs[start..end], window);
            freqs[start..end].copy_from_slice(&filtered);
        }
    }
}

/// Median filter with reflect padding, matching
/// `scipy.ndimage.median_filter(..., mode="reflect")`.
fn median_filter_reflect(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    let half = window / 2;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let mut window_vals: Vec<f64> = Vec::with_capacity(window);
        for k in 0..window {
            let offset = k as isize - half as isize;
            let idx = reflect_index(i as isize + offset, n);
            window_vals.push(data[idx]);
        }
        window_vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out.push(window_vals[window_vals.len() / 2]);
    }

    out
}

/// "reflect" (a.k.a. half-sample symmetric) boundary handling:
/// `d c b a | a b c d | d c b a`.
fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut idx = i;
    while idx < 0 || idx >= n {
        if idx < 0 {
            idx = -idx - 1;
        } else if idx >= n {
            idx = 2 * n - idx - 1;
        }
    }
    idx as usize
}

fn moving_average_reflect(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    let half = window / 2;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let mut sum = 0.0;
        for k in 0..window {
            let offset = k as isize - half as isize;
            let idx = reflect_index(i as isize + offset, n);
            sum += data[idx];
        }
        out.push(sum / window as f64);
    }

    out
}

/// Rolling standard deviation via cumulative sums — O(n), fine at the 10 ms
/// hop for clips up to tens of minutes; a Welford window would be worth
/// switching to for much longer inputs.
fn rolling_std(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    let mut result = vec![0.0; n];
    if n < window {
        return result;
    }

    let mut cumsum = vec![0.0; n + 1];
    let mut cumsum2 = vec![0.0; n + 1];
    for i in 0..n {
        cumsum[i + 1] = cumsum[i] + data[i];
        cumsum2[i + 1] = cumsum2[i] + data[i] * data[i];
    }

    let half = window / 2;
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let count = (hi - lo) as f64;
        let s = cumsum[hi] - cumsum[lo];
        let s2 = cumsum2[hi] - cumsum2[lo];
        let variance = s2 / count - (s / count).powi(2);
        result[i] = variance.max(0.0).sqrt();
    }

    result
}

fn smooth_vibrato(freqs: &mut [f64], confs: &[f64], smooth_window: usize, extent_cents: f64) {
    let segments = find_segments(freqs, confs);

    for (start, end) in segments {
        if end - start < smooth_window {
            continue;
        }

        let segment = &freqs[start..end];
        let smoothed = moving_average_reflect(segment, smooth_window);

        let cents: Vec<f64> = segment
            .iter()
            .zip(smoothed.iter())
            .map(|(&f, &s)| {
                let c = 1200.0 * (f / s).log2();
                if c.is_finite() { c } else { 0.0 }
            })
            .collect();

        let analysis_window = smooth_window * 2;
        if cents.len() >= analysis_window {
            let local_std = rolling_std(&cents, analysis_window);
            let threshold = extent_cents / 4.0;

            for (i, &sigma) in local_std.iter().enumerate() {
                if sigma > threshold {
                    freqs[start + i] = smoothed[i];
                }
            }
        }
    }
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

    #[test]
    fn short_input_passes_through_unchanged() {
        let frames = vec![frame(0.0, 440.0, 0.9), frame(0.01, 441.0, 0.9)];
        let out = post_process_pitch(&frames, &PitchPostProcessConfig::default());
        assert_eq!(out, frames);
    }

    #[test]
    fn median_filter_removes_single_frame_jitter() {
        let mut frames: Vec<PitchFrame> = (0..20).map(|i| frame(i as f64 * 0.01, 440.0, 0.9)).collect();
        frames[10].frequency_hz = 880.0; // single-frame outlier (octave jump)

        let out = post_process_pitch(
            &frames,
            &PitchPostProcessConfig {
                median_window: 5,
                vibrato_smooth_window: 13,
                vibrato_extent_cents: 120.0,
            },
        );

        assert!(
            (out[10].frequency_hz - 440.0).abs() < 1.0,
            "expected jitter suppressed, got {}",
            out[10].frequency_hz
        );
    }

    #[test]
    fn fixed_point_on_already_smoothed_frames() {
        let frames: Vec<PitchFrame> = (0..60).map(|i| frame(i as f64 * 0.01, 440.0, 0.9)).collect();
        let once = post_process_pitch(&frames, &PitchPostProcessConfig::default());
        let twice = post_process_pitch(&once, &PitchPostProcessConfig::default());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a.frequency_hz - b.frequency_hz).abs() < 1e-9);
        }
    }

    #[test]
    fn unvoiced_frames_are_untouched() {
        let frames = vec![
            frame(0.0, 0.0, 0.0),
            frame(0.01, 0.0, 0.0),
            frame(0.02, 0.0, 0.0),
            frame(0.03, 0.0, 0.0),
            frame(0.04, 0.0, 0.0),
        ];
        let out = post_process_pitch(&frames, &PitchPostProcessConfig::default());
        assert_eq!(out, frames);
    }
}
