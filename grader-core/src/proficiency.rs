//! # Proficiency Scoring Module
//!
//! Grades a performance against the expected pitch sequence and moves the
//! performer's proficiency towards the difficulty of the piece. Scoring
//! is a pure function of its inputs; the caller owns the score history.

use serde::{Deserialize, Serialize};

use crate::audio::SampleBuffer;
use crate::config::AnalysisConfig;
use crate::error::{GradeError, Result};
use crate::onset::{OnsetDetector, SpectralFluxOnsetDetector};
use crate::pitch::{PitchContourEstimator, YinEstimator};
use crate::segment::{Note, segment};
use crate::tuning::within_semitone;

/// Smallest upward step for any correct note when the difficulty is at
/// or above the current proficiency.
const MIN_PROGRESS: f64 = 0.1;

/// One pitch the performer is expected to play.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedPitch {
    /// Target frequency in Hz.
    pub freq: f64,
    /// Carried through from the request; matching does not use it yet.
    pub tolerance_weight: f64,
}

impl ExpectedPitch {
    pub fn new(freq: f64, tolerance_weight: f64) -> Self {
        Self { freq, tolerance_weight }
    }
}

/// Outcome of grading one performance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grade {
    pub matched: usize,
    pub total: usize,
    pub accuracy: f64,
    pub proficiency: f64,
}

/// Counts expected pitches found, in order, among the notes.
///
/// Each expected pitch scans forward from the note cursor; a match moves
/// the cursor past the matched note. The first expected pitch with no
/// match among the remaining notes ends matching for the whole sequence.
pub fn count_matches(notes: &[Note], expected: &[ExpectedPitch]) -> usize {
    let mut cursor = 0;
    let mut matched = 0;

    for pitch in expected {
        match notes[cursor..]
            .iter()
            .position(|note| within_semitone(pitch.freq, note.freq))
        {
            Some(offset) => {
                matched += 1;
                cursor += offset + 1;
            }
            None => break,
        }
    }
    matched
}

/// Moves `current` towards `difficulty` according to `accuracy`.
///
/// Above the difficulty, mistakes pull the score down and a perfect run
/// leaves it unchanged. At or below it, the score rises with accuracy,
/// by at least [`MIN_PROGRESS`] for a perfect run.
pub fn update_proficiency(difficulty: i64, current: f64, accuracy: f64) -> f64 {
    let base = (difficulty as f64 - current) * 0.5;
    if base < 0.0 {
        base * (1.0 - accuracy) + current
    } else {
        base.max(MIN_PROGRESS) * accuracy + current
    }
}

/// Grades notes that were already extracted.
///
/// # Returns
/// * `Err(GradeError::EmptyExpectedPitches)` if `expected` is empty
/// * `Err(GradeError::InvalidInput)` for non-finite numbers
pub fn grade_notes(
    notes: &[Note],
    difficulty: i64,
    expected: &[ExpectedPitch],
    current_proficiency: f64,
) -> Result<Grade> {
    validate_inputs(expected, current_proficiency)?;

    let matched = count_matches(notes, expected);
    let total = expected.len();
    let accuracy = matched as f64 / total as f64;
    let proficiency = update_proficiency(difficulty, current_proficiency, accuracy);

    log::debug!(
        "Matched {matched}/{total} expected pitches against {} notes: proficiency {current_proficiency} -> {proficiency}",
        notes.len()
    );

    Ok(Grade {
        matched,
        total,
        accuracy,
        proficiency,
    })
}

fn validate_inputs(expected: &[ExpectedPitch], current_proficiency: f64) -> Result<()> {
    if expected.is_empty() {
        return Err(GradeError::EmptyExpectedPitches);
    }
    if !current_proficiency.is_finite() {
        return Err(GradeError::InvalidInput(format!(
            "current proficiency must be finite, got {current_proficiency}"
        )));
    }
    if let Some(pitch) = expected.iter().find(|p| !p.freq.is_finite()) {
        return Err(GradeError::InvalidInput(format!(
            "expected pitch frequency must be finite, got {}",
            pitch.freq
        )));
    }
    Ok(())
}

/// Runs the full pipeline: pitch contour and onsets, segmentation,
/// matching and the proficiency update.
///
/// The pitch estimator and onset detector are injectable so the pipeline
/// can run on synthetic contours.
#[derive(Debug, Clone)]
pub struct ProficiencyScorer<P = YinEstimator, O = SpectralFluxOnsetDetector> {
    config: AnalysisConfig,
    pitch: P,
    onsets: O,
}

impl ProficiencyScorer {
    /// Scorer using the YIN estimator and the spectral flux onset detector.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let pitch = YinEstimator::from_config(&config)?;
        let onsets = SpectralFluxOnsetDetector::from_config(&config)?;
        Ok(Self { config, pitch, onsets })
    }
}

impl<P: PitchContourEstimator, O: OnsetDetector> ProficiencyScorer<P, O> {
    pub fn with_detectors(config: AnalysisConfig, pitch: P, onsets: O) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, pitch, onsets })
    }

    /// Segments a recording into notes.
    pub fn extract_notes(&self, buffer: &SampleBuffer) -> Result<Vec<Note>> {
        let hop_length = self.config.hop_length;
        let contour = self.pitch.estimate(buffer, hop_length)?;
        let onsets = self.onsets.detect(buffer, hop_length)?;
        Ok(segment(
            buffer,
            &onsets,
            &contour,
            hop_length,
            self.config.lookahead_frames,
        ))
    }

    /// Grades a recording. Input is validated before any analysis runs.
    pub fn grade(
        &self,
        buffer: &SampleBuffer,
        difficulty: i64,
        expected: &[ExpectedPitch],
        current_proficiency: f64,
    ) -> Result<Grade> {
        validate_inputs(expected, current_proficiency)?;
        let notes = self.extract_notes(buffer)?;
        grade_notes(&notes, difficulty, expected, current_proficiency)
    }

    /// Updated proficiency for a recording.
    pub fn score(
        &self,
        buffer: &SampleBuffer,
        difficulty: i64,
        expected: &[ExpectedPitch],
        current_proficiency: f64,
    ) -> Result<f64> {
        self.grade(buffer, difficulty, expected, current_proficiency)
            .map(|grade| grade.proficiency)
    }
}
