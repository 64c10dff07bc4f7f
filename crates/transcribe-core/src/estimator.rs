//! Pitch estimator seam.
//!
//! The core consumes pitch estimates; it never produces them. Anything
//! satisfying this trait (a neural periodicity model, a YIN estimator, a
//! fixture for tests) can drive the pipeline.

/// A restricted pitch search range, in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRange {
    pub fmin: f64,
    pub fmax: f64,
}

impl Default for PitchRange {
    /// 65-1047 Hz: the reference range, spanning roughly
    /// C2 to C6.
    fn default() -> Self {
        Self {
            fmin: 65.0,
            fmax: 1047.0,
        }
    }
}

/// One frame of raw estimator output, before any post-processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedFrame {
    /// Hz; 0.0 denotes unvoiced.
    pub frequency_hz: f64,
    /// Periodicity / voicing confidence, in `[0, 1]`.
    pub periodicity: f64,
}

/// Produces one [`EstimatedFrame`] per 10 ms hop (`N = ceil(len(samples) /
/// 160)` at 16 kHz) from a mono waveform.
pub trait PitchEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32, range: PitchRange) -> Vec<EstimatedFrame>;
}
