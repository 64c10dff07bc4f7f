use thiserror::Error;

/// Errors surfaced by the transcription pipeline.
///
/// `InvalidInput` is a caller mistake (bad audio, bad sample rate);
/// `DomainViolation` means a stage produced data that breaks one of the
/// pipeline's own invariants and indicates a bug in that stage, not in the
/// caller. The pipeline aborts rather than silently dropping on either.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("domain violation: {0}")]
    DomainViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
