// grader-core/src/lib.rs

//! The core logic for the performance grader.
//! This crate turns a recorded performance into discrete notes and
//! scores them against an expected pitch sequence. It is completely
//! headless and keeps no state between calls: the proficiency history
//! belongs to the caller.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod onset;
pub mod pitch;
pub mod proficiency;
pub mod segment;
pub mod tuning;

pub use audio::{SampleBuffer, load_wav};
pub use config::AnalysisConfig;
pub use error::{GradeError, Result};
pub use onset::{OnsetDetector, SpectralFluxOnsetDetector};
pub use pitch::{PitchContour, PitchContourEstimator, YinEstimator};
pub use proficiency::{ExpectedPitch, Grade, ProficiencyScorer, count_matches, update_proficiency};
pub use segment::{Note, segment};

/// Sampling rate assumed when a request does not name one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
