//! YIN-based pitch estimator.
//!
//! The external collaborator that `transcribe_core::pipeline::transcribe`
//! consumes is any implementation of `PitchEstimator`; the reference is a
//! neural periodicity model, but the interface only requires 10 ms frames
//! of `(frequency_hz, periodicity)` restricted to `[fmin, fmax]`. This crate
//! satisfies that interface with the YIN algorithm (de Cheveigné & Kawahara,
//! 2002), a classical autocorrelation-based monophonic pitch detector.

use transcribe_core::{EstimatedFrame, PitchEstimator, PitchRange};

/// Samples per 10 ms hop at 16 kHz, matching the pipeline's fixed frame
/// rate.
const HOP_SAMPLES: usize = 160;

pub struct YinEstimator {
    threshold: f32,
}

impl Default for YinEstimator {
    /// `0.1`, as recommended in the original YIN paper.
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

impl YinEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower is stricter (misses quiet notes less often become false
    /// positives); higher is more permissive. Clamped to `[0.01, 0.5]`.
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.01, 0.5),
        }
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32, range: PitchRange) -> Vec<EstimatedFrame> {
        if samples.is_empty() {
            return Vec::new();
        }

        let sr = sample_rate as f64;
        let min_period = (sr / range.fmax).floor().max(1.0) as usize;
        let max_period = (sr / range.fmin).ceil() as usize;
        let window = max_period * 2;

        let n_frames = samples.len().div_ceil(HOP_SAMPLES);
        let mut frames = Vec::with_capacity(n_frames);

        for i in 0..n_frames {
            let start = i * HOP_SAMPLES;
            let end = (start + window).min(samples.len());
            let analysis_window = if end > start { &samples[start..end] } else { &[] };

            frames.push(detect_frame(analysis_window, sr, min_period, max_period, self.threshold));
        }

        frames
    }
}

/// Run the YIN pipeline (difference function, cumulative mean normalized
/// difference, absolute threshold, parabolic interpolation) over one
/// analysis window and return a frequency/periodicity estimate.
fn detect_frame(samples: &[f32], sample_rate: f64, min_period: usize, max_period: usize, threshold: f32) -> EstimatedFrame {
    let max_period = max_period.min(samples.len() / 2);

    if samples.len() < max_period * 2 || max_period <= min_period || max_period == 0 {
        return EstimatedFrame {
            frequency_hz: 0.0,
            periodicity: 0.0,
        };
    }

    let difference = compute_difference(samples, max_period);
    let cumulative_mean = compute_cumulative_mean(&difference, max_period);
    let (period, aperiodicity) = find_best_period(&cumulative_mean, min_period, max_period, threshold);

    if period == 0 {
        return EstimatedFrame {
            frequency_hz: 0.0,
            periodicity: 0.0,
        };
    }

    let refined_period = parabolic_interpolation(&cumulative_mean, period, max_period);
    let frequency_hz = sample_rate / refined_period;
    let periodicity = (1.0 - aperiodicity).clamp(0.0, 1.0) as f64;

    EstimatedFrame { frequency_hz, periodicity }
}

/// `d(tau) = sum((x[j] - x[j+tau])^2)`, computed via the energy identity
/// `d(tau) = e(0) + e(tau) - 2*autocorr(tau)` with prefix-sum energy.
fn compute_difference(samples: &[f32], max_period: usize) -> Vec<f32> {
    let window = max_period;
    let mut cum_sq = vec![0.0f64; samples.len() + 1];
    for i in 0..samples.len() {
        cum_sq[i + 1] = cum_sq[i] + (samples[i] as f64) * (samples[i] as f64);
    }
    let energy = |start: usize, len: usize| -> f64 {
        if start + len <= samples.len() {
            cum_sq[start + len] - cum_sq[start]
        } else {
            0.0
        }
    };

    let mut difference = vec![0.0f32; max_period + 1];
    for tau in 1..=max_period {
        let mut autocorr = 0.0f64;
        for j in 0..window {
            if j + tau < samples.len() {
                autocorr += (samples[j] as f64) * (samples[j + tau] as f64);
            }
        }
        let e0 = energy(0, window);
        let e_tau = energy(tau, window);
        difference[tau] = (e0 + e_tau - 2.0 * autocorr) as f32;
    }
    difference
}

/// `d'(0) = 1`, `d'(tau) = d(tau) / ((1/tau) * sum(d(j) for j in 1..=tau))`.
fn compute_cumulative_mean(difference: &[f32], max_period: usize) -> Vec<f32> {
    let mut cumulative_mean = vec![0.0f32; max_period + 1];
    cumulative_mean[0] = 1.0;

    let mut running_sum = 0.0f32;
    for tau in 1..=max_period {
        running_sum += difference[tau];
        cumulative_mean[tau] = if running_sum > 1e-10 {
            difference[tau] * tau as f32 / running_sum
        } else {
            1.0
        };
    }
    cumulative_mean
}

/// Return the first local minimum below `threshold`, not the global
/// minimum — the classic YIN trick for avoiding octave errors (locking
/// onto a subharmonic).
fn find_best_period(cumulative_mean: &[f32], min_period: usize, max_period: usize, threshold: f32) -> (usize, f32) {
    let mut tau = min_period;
    while tau < max_period {
        if cumulative_mean[tau] < threshold {
            while tau + 1 < max_period && cumulative_mean[tau + 1] < cumulative_mean[tau] {
                tau += 1;
            }
            return (tau, cumulative_mean[tau]);
        }
        tau += 1;
    }

    let mut best_tau = min_period;
    let mut best_val = cumulative_mean[min_period];
    for tau in min_period + 1..=max_period {
        if cumulative_mean[tau] < best_val {
            best_val = cumulative_mean[tau];
            best_tau = tau;
        }
    }

    if best_val < 0.5 {
        (best_tau, best_val)
    } else {
        (0, 1.0)
    }
}

/// Fit a parabola through `(tau-1, tau, tau+1)` and return the vertex.
fn parabolic_interpolation(cumulative_mean: &[f32], tau: usize, max_period: usize) -> f64 {
    if tau < 1 || tau >= max_period {
        return tau as f64;
    }

    let s0 = cumulative_mean[tau - 1] as f64;
    let s1 = cumulative_mean[tau] as f64;
    let s2 = cumulative_mean[tau + 1] as f64;

    let denominator = 2.0 * (2.0 * s1 - s2 - s0);
    if denominator.abs() > 1e-10 {
        tau as f64 + (s2 - s0) / denominator
    } else {
        tau as f64
    }
}
