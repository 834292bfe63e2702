//! # Musical Tuning Module
//!
//! Frequency and time conversions shared by the segmenter and the scorer.
//! Pitches follow twelve-tone equal temperament with A4 = 440 Hz.
//!
//! ## Features
//! - Analysis frame index <-> seconds conversions
//! - One-semitone matching window
//! - MIDI number and note name conversions
//! - Cent deviation calculations

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Frequency ratio between two adjacent semitones, `2^(1/12)`.
pub const SEMITONE_RATIO: f64 = 1.059_463_094_359_295_3;

const A4_FREQUENCY: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Note name to MIDI number lookup covering MIDI 0 (C-1) to 127 (G9).
///
/// Both sharp and flat spellings are present, so "C#4" and "Db4" both
/// resolve to 61.
static NOTE_MAP: Lazy<BTreeMap<String, u8>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for midi in 0..=127u8 {
        let pitch_class = (midi % 12) as usize;
        let octave = midi as i32 / 12 - 1;
        map.insert(format!("{}{}", SHARP_NAMES[pitch_class], octave), midi);
        map.insert(format!("{}{}", FLAT_NAMES[pitch_class], octave), midi);
    }
    map
});

/// Start time in seconds of an analysis frame.
pub fn frames_to_time(frame: usize, sample_rate: u32, hop_length: usize) -> f64 {
    (frame * hop_length) as f64 / sample_rate as f64
}

/// Index of the analysis frame containing `time`.
///
/// The time is first snapped to the nearest sample so that a value
/// produced by [`frames_to_time`] maps back to the same frame despite
/// floating point error.
pub fn time_to_frame(time: f64, sample_rate: u32, hop_length: usize) -> usize {
    let sample = (time * sample_rate as f64).round().max(0.0) as usize;
    sample / hop_length
}

/// Whether `actual` lies strictly within one semitone of `expected`.
pub fn within_semitone(expected: f64, actual: f64) -> bool {
    expected / SEMITONE_RATIO < actual && actual < expected * SEMITONE_RATIO
}

/// Converts a frequency to a (fractional) MIDI note number.
pub fn hz_to_midi(freq: f64) -> f64 {
    A4_MIDI + 12.0 * (freq / A4_FREQUENCY).log2()
}

/// Converts a (fractional) MIDI note number to a frequency.
pub fn midi_to_hz(midi: f64) -> f64 {
    A4_FREQUENCY * 2f64.powf((midi - A4_MIDI) / 12.0)
}

/// Finds the name of the nearest equal-tempered note, e.g. "C3".
///
/// # Returns
/// * `None` for non-positive or non-finite frequencies
pub fn hz_to_note_name(freq: f64) -> Option<String> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let midi = hz_to_midi(freq).round() as i64;
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    Some(format!("{}{}", SHARP_NAMES[pitch_class], octave))
}

/// Gets the frequency of a note name such as "A4", "C#3" or "Bb2".
///
/// # Returns
/// * `None` if the name is not a note between C-1 and G9
pub fn note_name_to_hz(name: &str) -> Option<f64> {
    NOTE_MAP
        .get(name.trim())
        .map(|&midi| midi_to_hz(midi as f64))
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// Nearest note name and how far `freq` sits from it in cents.
pub fn nearest_note(freq: f64) -> Option<(String, f64)> {
    let name = hz_to_note_name(freq)?;
    let target = midi_to_hz(hz_to_midi(freq).round());
    Some((name, cents_deviation(freq, target)))
}
