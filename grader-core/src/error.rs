//! Error type shared by every stage of the grading pipeline.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GradeError>;

#[derive(Error, Debug)]
pub enum GradeError {
    /// Accuracy is `matched / expected`, so an empty expectation cannot be graded.
    #[error("expected pitch sequence must not be empty")]
    EmptyExpectedPitches,
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
}

impl GradeError {
    /// True when the caller supplied bad input, as opposed to the
    /// analysis itself failing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GradeError::EmptyExpectedPitches
                | GradeError::InvalidSampleRate(_)
                | GradeError::InvalidInput(_)
        )
    }
}
