//! End-to-end grading of synthesized performances through the real
//! pitch estimator and onset detector.

use approx::assert_relative_eq;
use grader_core::{
    AnalysisConfig, ExpectedPitch, GradeError, ProficiencyScorer, SampleBuffer, tuning,
};

const SR: u32 = 22050;
const C3: f64 = 130.813;
const G3: f64 = 195.998;

fn silence(seconds: f64) -> Vec<f32> {
    vec![0.0; (seconds * SR as f64) as usize]
}

/// A sine tone that starts abruptly and fades out over its last 50 ms.
fn tone(freq: f64, seconds: f64) -> Vec<f32> {
    let n = (seconds * SR as f64) as usize;
    let fade = (0.05 * SR as f64) as usize;
    (0..n)
        .map(|i| {
            let gain = if i + fade > n { (n - i) as f64 / fade as f64 } else { 1.0 };
            let phase = 2.0 * std::f64::consts::PI * freq * i as f64 / SR as f64;
            (0.5 * gain * phase.sin()) as f32
        })
        .collect()
}

fn performance(parts: &[Vec<f32>]) -> SampleBuffer {
    SampleBuffer::new(parts.concat(), SR).unwrap()
}

fn c3_performance() -> SampleBuffer {
    performance(&[silence(0.25), tone(C3, 1.0), silence(0.25)])
}

fn expected(freqs: &[f64]) -> Vec<ExpectedPitch> {
    freqs.iter().map(|&f| ExpectedPitch::new(f, 0.2)).collect()
}

fn scorer() -> ProficiencyScorer {
    ProficiencyScorer::new(AnalysisConfig::default()).unwrap()
}

#[test]
fn c3_performance_is_segmented() {
    let notes = scorer().extract_notes(&c3_performance()).unwrap();
    assert!(!notes.is_empty());
    assert!(notes.iter().any(|n| tuning::within_semitone(C3, n.freq)));
    assert!(notes.iter().all(|n| n.duration > 0.0));
    assert!(notes.windows(2).all(|w| w[0].start_time <= w[1].start_time));
}

#[test]
fn c3_performance_scenarios() {
    let scorer = scorer();
    let buffer = c3_performance();
    let cases: [(&[f64], f64, f64); 6] = [
        (&[C3], 3.0, 4.0),
        (&[C3], 6.0, 6.0),
        (&[C3, 400.0], 3.0, 3.5),
        (&[C3, 400.0], 6.0, 5.75),
        (&[400.0], 3.0, 3.0),
        (&[400.0], 6.0, 5.5),
    ];
    for (freqs, current, want) in cases {
        let got = scorer.score(&buffer, 5, &expected(freqs), current).unwrap();
        assert_relative_eq!(got, want, epsilon = 1e-9);
    }
}

#[test]
fn melody_is_matched_in_order() {
    let buffer = performance(&[
        silence(0.2),
        tone(C3, 0.6),
        silence(0.2),
        tone(G3, 0.6),
        silence(0.2),
    ]);
    let scorer = scorer();

    let grade = scorer.grade(&buffer, 5, &expected(&[C3, G3]), 3.0).unwrap();
    assert_eq!(grade.matched, 2);
    assert_relative_eq!(grade.proficiency, 4.0, epsilon = 1e-9);

    // G3 consumes the last note, so C3 has nothing left to match.
    let grade = scorer.grade(&buffer, 5, &expected(&[G3, C3]), 3.0).unwrap();
    assert_eq!(grade.matched, 1);
    assert_relative_eq!(grade.accuracy, 0.5);
}

#[test]
fn silent_recording_scores_as_no_match() {
    let buffer = performance(&[silence(1.0)]);
    let scorer = scorer();
    assert!(scorer.extract_notes(&buffer).unwrap().is_empty());
    assert_relative_eq!(scorer.score(&buffer, 5, &expected(&[C3]), 3.0).unwrap(), 3.0);
    assert_relative_eq!(scorer.score(&buffer, 5, &expected(&[C3]), 6.0).unwrap(), 5.5);
}

#[test]
fn empty_expected_sequence_is_a_validation_error() {
    let err = scorer().score(&c3_performance(), 5, &[], 3.0).unwrap_err();
    assert!(matches!(err, GradeError::EmptyExpectedPitches));
    assert!(err.is_validation());
}
