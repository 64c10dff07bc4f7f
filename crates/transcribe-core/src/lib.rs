//! Monophonic vocal transcription pipeline.
//!
//! Turns a 16 kHz mono waveform plus externally-supplied pitch-estimator
//! output into a time-ordered list of musical notes. Single-threaded,
//! synchronous, and pure: no I/O, no shared state, no retries. See
//! [`pipeline::transcribe`] for the entry point.

mod error;
mod estimator;
mod filter;
mod key;
mod merge;
mod note_name;
mod onset;
mod pipeline;
mod pitch_post;
mod preprocess;
mod segment;
mod types;
mod velocity;

#[cfg(feature = "serialization")]
mod report;

pub use error::{Error, Result};
pub use estimator::{EstimatedFrame, PitchEstimator, PitchRange};
pub use filter::MIN_FILTERED_DURATION_S;
pub use key::KeyFilterConfig;
pub use note_name::{hz_to_midi, midi_to_hz, midi_to_note_name, note_name_to_midi};
pub use pipeline::{transcribe, PipelineConfig, TranscriptionResult};
pub use pitch_post::PitchPostProcessConfig;
pub use preprocess::{compute_frame_energy, energy_threshold, preprocess};
pub use segment::SegmentConfig;
pub use types::{EnergyFrame, KeyMode, Note, PitchFrame, SectionKey};

#[cfg(feature = "serialization")]
pub use report::{build_report, KeyInfo, Metadata, ModelSize, NoteReport, Report};
