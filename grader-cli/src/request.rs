//! Payload decoding and validation shared by the stream and HTTP adapters.
//!
//! A request carries `audio`, `difficulty`, `correct_pitches`,
//! `current_proficiency` and an optional `sampling_rate`. A field that is
//! absent or `null` is missing; `0` is a present value.

use grader_core::{
    DEFAULT_SAMPLE_RATE, ExpectedPitch, GradeError, ProficiencyScorer, SampleBuffer,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("JSON decoding error: {0}")]
    Json(serde_json::Error),
    #[error("Input validation error: {0}")]
    Invalid(String),
    #[error("Unexpected error: {0}")]
    Internal(GradeError),
}

impl PayloadError {
    /// True when the failure is ours rather than the caller's.
    pub fn is_internal(&self) -> bool {
        matches!(self, PayloadError::Internal(_))
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        // Well-formed JSON of the wrong shape is a validation failure.
        if err.is_data() {
            PayloadError::Invalid(err.to_string())
        } else {
            PayloadError::Json(err)
        }
    }
}

impl From<GradeError> for PayloadError {
    fn from(err: GradeError) -> Self {
        if err.is_validation() {
            PayloadError::Invalid(err.to_string())
        } else {
            PayloadError::Internal(err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    audio: Option<Vec<f64>>,
    difficulty: Option<f64>,
    correct_pitches: Option<Vec<Value>>,
    current_proficiency: Option<f64>,
    sampling_rate: Option<f64>,
}

/// A validated grading request.
#[derive(Debug, Clone)]
pub struct ProficiencyRequest {
    pub audio: SampleBuffer,
    pub difficulty: i64,
    pub correct_pitches: Vec<ExpectedPitch>,
    pub current_proficiency: f64,
}

#[derive(Debug, Serialize)]
pub struct ProficiencyResponse {
    pub proficiency: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn missing(field: &str) -> PayloadError {
    PayloadError::Invalid(format!("Missing '{field}' data in input JSON."))
}

impl ProficiencyRequest {
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        let raw: RawRequest = serde_json::from_str(body)?;

        let audio = raw.audio.ok_or_else(|| missing("audio"))?;

        let difficulty = raw.difficulty.ok_or_else(|| missing("difficulty"))?;
        if !difficulty.is_finite() || difficulty.fract() != 0.0 {
            return Err(PayloadError::Invalid(format!(
                "'difficulty' must be an integer, got {difficulty}"
            )));
        }
        // 2^63 itself does not fit, hence `>=`.
        if difficulty.abs() >= i64::MAX as f64 {
            return Err(PayloadError::Invalid(format!(
                "'difficulty' is out of range, got {difficulty}"
            )));
        }

        let correct_pitches = raw
            .correct_pitches
            .ok_or_else(|| missing("correct_pitches"))?
            .iter()
            .map(parse_pitch)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                PayloadError::Invalid(
                    "Invalid format for 'correct_pitches'. Expected list of [float, float]."
                        .to_string(),
                )
            })?;

        let current_proficiency = raw
            .current_proficiency
            .ok_or_else(|| missing("current_proficiency"))?;

        let sampling_rate = match raw.sampling_rate {
            None => DEFAULT_SAMPLE_RATE,
            Some(rate) if rate.is_finite() && rate >= 1.0 && rate <= u32::MAX as f64 => {
                rate.round() as u32
            }
            Some(rate) => {
                return Err(PayloadError::Invalid(format!(
                    "'sampling_rate' must be a positive number, got {rate}"
                )));
            }
        };

        Ok(Self {
            audio: SampleBuffer::from_f64(&audio, sampling_rate)?,
            difficulty: difficulty as i64,
            correct_pitches,
            current_proficiency,
        })
    }
}

fn parse_pitch(item: &Value) -> Option<ExpectedPitch> {
    match item.as_array()?.as_slice() {
        [freq, weight] => Some(ExpectedPitch::new(freq.as_f64()?, weight.as_f64()?)),
        _ => None,
    }
}

/// Decodes a request body and grades it.
pub fn handle_payload(body: &str, scorer: &ProficiencyScorer) -> Result<f64, PayloadError> {
    let request = ProficiencyRequest::parse(body)?;
    log::info!(
        "Grading {:.2}s of audio at {} Hz against {} expected pitches",
        request.audio.duration(),
        request.audio.sample_rate(),
        request.correct_pitches.len()
    );
    let proficiency = scorer.score(
        &request.audio,
        request.difficulty,
        &request.correct_pitches,
        request.current_proficiency,
    )?;
    Ok(proficiency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "audio": [0.0, 0.1, -0.1],
            "difficulty": 5,
            "correct_pitches": [[130.813, 0.2], [400, 0.2]],
            "current_proficiency": 3.5,
        })
    }

    fn parse(value: &Value) -> Result<ProficiencyRequest, PayloadError> {
        ProficiencyRequest::parse(&value.to_string())
    }

    fn error_message(value: &Value) -> String {
        parse(value).unwrap_err().to_string()
    }

    #[test]
    fn test_parses_valid_request_with_default_rate() {
        let request = parse(&valid()).unwrap();
        assert_eq!(request.audio.len(), 3);
        assert_eq!(request.audio.sample_rate(), 44100);
        assert_eq!(request.difficulty, 5);
        assert_eq!(request.correct_pitches, vec![
            ExpectedPitch::new(130.813, 0.2),
            ExpectedPitch::new(400.0, 0.2),
        ]);
        assert_eq!(request.current_proficiency, 3.5);
    }

    #[test]
    fn test_zero_is_a_present_value() {
        let mut value = valid();
        value["difficulty"] = json!(0);
        value["current_proficiency"] = json!(0);
        let request = parse(&value).unwrap();
        assert_eq!(request.difficulty, 0);
        assert_eq!(request.current_proficiency, 0.0);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        for field in ["audio", "difficulty", "correct_pitches", "current_proficiency"] {
            let mut value = valid();
            value.as_object_mut().unwrap().remove(field);
            assert_eq!(
                error_message(&value),
                format!("Input validation error: Missing '{field}' data in input JSON.")
            );

            let mut value = valid();
            value[field] = Value::Null;
            assert!(matches!(parse(&value), Err(PayloadError::Invalid(_))));
        }
    }

    #[test]
    fn test_malformed_pitches_are_rejected() {
        for bad in [json!([[130.8]]), json!([[130.8, 0.2, 1.0]]), json!([130.8]), json!([["a", 0.2]])] {
            let mut value = valid();
            value["correct_pitches"] = bad;
            assert!(error_message(&value).contains("Invalid format for 'correct_pitches'"));
        }
    }

    #[test]
    fn test_fractional_difficulty_is_rejected() {
        let mut value = valid();
        value["difficulty"] = json!(4.5);
        assert!(matches!(parse(&value), Err(PayloadError::Invalid(_))));
        value["difficulty"] = json!(4.0);
        assert_eq!(parse(&value).unwrap().difficulty, 4);
    }

    #[test]
    fn test_out_of_range_difficulty_is_rejected() {
        let mut value = valid();
        for huge in [1e20, -1e20, 9_223_372_036_854_775_808.0] {
            value["difficulty"] = json!(huge);
            let err = parse(&value).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
        }
        value["difficulty"] = json!(1_000_000_000_000_000i64);
        assert_eq!(parse(&value).unwrap().difficulty, 1_000_000_000_000_000);
    }

    #[test]
    fn test_sampling_rate() {
        let mut value = valid();
        value["sampling_rate"] = json!(22050);
        assert_eq!(parse(&value).unwrap().audio.sample_rate(), 22050);
        value["sampling_rate"] = json!(0);
        assert!(matches!(parse(&value), Err(PayloadError::Invalid(_))));
        value["sampling_rate"] = json!(-8000);
        assert!(matches!(parse(&value), Err(PayloadError::Invalid(_))));
    }

    #[test]
    fn test_wrong_types_and_syntax() {
        let mut value = valid();
        value["audio"] = json!("not audio");
        assert!(matches!(parse(&value), Err(PayloadError::Invalid(_))));

        let err = ProficiencyRequest::parse("{\"audio\": [").unwrap_err();
        assert!(matches!(err, PayloadError::Json(_)));
        assert!(err.to_string().starts_with("JSON decoding error"));
    }

    #[test]
    fn test_empty_pitch_list_is_a_validation_error() {
        let mut value = valid();
        value["correct_pitches"] = json!([]);
        let scorer = ProficiencyScorer::new(Default::default()).unwrap();
        let err = handle_payload(&value.to_string(), &scorer).unwrap_err();
        assert!(matches!(err, PayloadError::Invalid(_)));
        assert!(!err.is_internal());
    }
}
