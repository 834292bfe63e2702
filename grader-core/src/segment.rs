//! # Note Segmentation Module
//!
//! Fuses a pitch contour and an onset sequence into discrete notes. The
//! model is monophonic: every onset opens one note that lasts until the
//! next onset (or the end of the recording).

use serde::Serialize;

use crate::audio::SampleBuffer;
use crate::pitch::PitchContour;
use crate::tuning::{frames_to_time, time_to_frame};

/// A detected note. `duration` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Onset time in seconds.
    pub start_time: f64,
    /// Seconds until the next onset or the end of the recording.
    pub duration: f64,
    /// Fundamental frequency in Hz.
    pub freq: f64,
}

impl Note {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Splits a recording into notes, one per usable onset.
///
/// The pitch of a note is the median of the voiced frames among the
/// `lookahead_frames` frames after its onset frame, skipping the attack
/// transient. If none of them is voiced the onset frame's own estimate
/// is used. Onsets with no pitch at all, or with a non-positive
/// duration, produce no note.
///
/// # Arguments
/// * `buffer` - The analysed recording (for its sample rate and duration)
/// * `onsets` - Increasing onset frame indices
/// * `contour` - Pitch contour on the same frame grid as `onsets`
/// * `hop_length` - Samples between frames
/// * `lookahead_frames` - Frames examined after each onset
pub fn segment(
    buffer: &SampleBuffer,
    onsets: &[usize],
    contour: &PitchContour,
    hop_length: usize,
    lookahead_frames: usize,
) -> Vec<Note> {
    let sample_rate = buffer.sample_rate();
    let total = buffer.duration();
    let onset_times: Vec<f64> = onsets
        .iter()
        .map(|&frame| frames_to_time(frame, sample_rate, hop_length))
        .collect();

    let mut notes = Vec::with_capacity(onsets.len());
    for (i, &start_time) in onset_times.iter().enumerate() {
        let frame = time_to_frame(start_time, sample_rate, hop_length);
        let Some(freq) = note_pitch(contour, frame, lookahead_frames) else {
            log::trace!("Discarding onset at {start_time:.3}s: no pitch");
            continue;
        };

        let end_time = onset_times.get(i + 1).copied().unwrap_or(total);
        let duration = end_time - start_time;
        if duration <= 0.0 {
            log::trace!("Discarding onset at {start_time:.3}s: duration {duration:.3}s");
            continue;
        }

        notes.push(Note { start_time, duration, freq });
    }

    log::debug!("Segmented {} notes from {} onsets", notes.len(), onsets.len());
    notes
}

/// Pitch for an onset at `frame`, or `None` if it cannot be determined.
fn note_pitch(contour: &PitchContour, frame: usize, lookahead_frames: usize) -> Option<f64> {
    let len = contour.len();
    if frame >= len {
        return None;
    }

    let start = (frame + 1).min(len - 1);
    let end = (frame + 1 + lookahead_frames).min(len);
    let candidates: Vec<f64> = contour.frames()[start..end]
        .iter()
        .flatten()
        .map(|&hz| hz as f64)
        .collect();

    median(candidates).or_else(|| contour.get(frame).map(|hz| hz as f64))
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
