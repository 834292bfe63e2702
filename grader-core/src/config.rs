//! Analysis parameters for the pitch estimator, the onset detector and
//! the segmenter. Every field has a default, so a config file only needs
//! to name what it overrides.

use serde::Deserialize;

use crate::error::{GradeError, Result};
use crate::tuning;

/// A frequency given either in Hz or as a note name ("C2").
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Frequency {
    Hz(f64),
    Note(String),
}

impl Frequency {
    pub fn hz(&self) -> Result<f64> {
        match self {
            Frequency::Hz(hz) => Ok(*hz),
            Frequency::Note(name) => tuning::note_name_to_hz(name)
                .ok_or_else(|| GradeError::InvalidConfig(format!("unknown note name '{name}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Samples between successive analysis frames, shared by the pitch
    /// contour and the onset sequence.
    pub hop_length: usize,
    /// Samples per analysis frame.
    pub frame_length: usize,
    /// Lowest pitch the estimator will report.
    pub fmin: Frequency,
    /// Highest pitch the estimator will report.
    pub fmax: Frequency,
    /// Frames with an RMS below this are treated as silence.
    pub amplitude_threshold: f32,
    /// How far above the global minimum of the normalised difference a
    /// dip may be and still be taken as the period.
    pub dip_tolerance: f32,
    /// Frames whose best dip is above this are unvoiced.
    pub clarity_threshold: f32,
    /// Minimum rise above the local onset-strength mean for a peak.
    pub onset_delta: f32,
    /// Frames examined after an onset when sampling its pitch.
    pub lookahead_frames: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hop_length: 512,
            frame_length: 2048,
            fmin: Frequency::Note("C2".to_string()),
            fmax: Frequency::Note("C7".to_string()),
            amplitude_threshold: 0.01,
            dip_tolerance: 0.05,
            clarity_threshold: 0.2,
            onset_delta: 0.07,
            lookahead_frames: 3,
        }
    }
}

impl AnalysisConfig {
    /// Checks sizes and the pitch range.
    pub fn validate(&self) -> Result<()> {
        if self.hop_length == 0 {
            return Err(GradeError::InvalidConfig("hop_length must be positive".into()));
        }
        if self.frame_length < 4 {
            return Err(GradeError::InvalidConfig("frame_length must be at least 4".into()));
        }
        if self.lookahead_frames == 0 {
            return Err(GradeError::InvalidConfig("lookahead_frames must be positive".into()));
        }
        let (fmin, fmax) = (self.fmin.hz()?, self.fmax.hz()?);
        if !(fmin > 0.0 && fmin < fmax && fmax.is_finite()) {
            return Err(GradeError::InvalidConfig(format!(
                "pitch range must satisfy 0 < fmin < fmax (got {fmin} Hz, {fmax} Hz)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hop_length, 512);
        assert_eq!(config.lookahead_frames, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            hop_length = 256
            fmin = 80.0
            fmax = "A5"
            "#,
        )
        .unwrap();
        assert_eq!(config.hop_length, 256);
        assert_eq!(config.frame_length, 2048);
        assert_eq!(config.fmin, Frequency::Hz(80.0));
        assert_eq!(config.fmax.hz().unwrap(), 880.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let config = AnalysisConfig {
            fmin: Frequency::Note("C5".into()),
            fmax: Frequency::Note("C4".into()),
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(GradeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unknown_note() {
        let config = AnalysisConfig {
            fmin: Frequency::Note("X9".into()),
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
