//! # Onset Detection Module
//!
//! Finds the analysis frames where new notes begin. The onset strength
//! of a frame is the average rise in log power across frequency bins
//! relative to the previous frame; onsets are the local peaks of that
//! envelope that stand out from their neighbourhood.

use crate::audio::SampleBuffer;
use crate::config::AnalysisConfig;
use crate::error::{GradeError, Result};
use crate::fft::power_spectrogram;

/// Floor applied to bin power before taking the logarithm.
const AMIN: f32 = 1e-10;
/// Dynamic range kept below the loudest bin, in dB.
const TOP_DB: f32 = 80.0;

/// Produces strictly increasing onset frame indices for `hop_length`.
pub trait OnsetDetector {
    fn detect(&self, buffer: &SampleBuffer, hop_length: usize) -> Result<Vec<usize>>;
}

/// Spectral flux onset detector with adaptive peak picking.
#[derive(Debug, Clone)]
pub struct SpectralFluxOnsetDetector {
    frame_length: usize,
    delta: f32,
}

impl SpectralFluxOnsetDetector {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            frame_length: config.frame_length,
            delta: config.onset_delta,
        })
    }
}

impl OnsetDetector for SpectralFluxOnsetDetector {
    fn detect(&self, buffer: &SampleBuffer, hop_length: usize) -> Result<Vec<usize>> {
        if hop_length == 0 {
            return Err(GradeError::InvalidConfig("hop_length must be positive".into()));
        }
        let spectrogram = power_spectrogram(buffer.samples(), self.frame_length, hop_length);
        let envelope = onset_strength(&spectrogram);
        let Some(envelope) = normalize(&envelope) else {
            log::debug!("Onset envelope is flat, no onsets");
            return Ok(Vec::new());
        };
        let params = PeakPicking::for_rate(buffer.sample_rate(), hop_length, self.delta);
        let onsets = pick_peaks(&envelope, &params);
        log::debug!("Detected {} onsets over {} frames", onsets.len(), envelope.len());
        Ok(onsets)
    }
}

/// Mean positive rise in dB per frame; the first frame is zero.
pub fn onset_strength(power: &[Vec<f32>]) -> Vec<f32> {
    let db: Vec<Vec<f32>> = power
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();
    let top = db
        .iter()
        .flatten()
        .cloned()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = top - TOP_DB;
    let db: Vec<Vec<f32>> = db
        .into_iter()
        .map(|frame| frame.into_iter().map(|v| v.max(floor)).collect())
        .collect();

    let mut envelope = vec![0.0; db.len()];
    for t in 1..db.len() {
        let bins = db[t].len().max(1) as f32;
        envelope[t] = db[t]
            .iter()
            .zip(&db[t - 1])
            .map(|(now, prev)| (now - prev).max(0.0))
            .sum::<f32>()
            / bins;
    }
    envelope
}

/// Rescales to `[0, 1]`; `None` when the envelope is flat.
fn normalize(envelope: &[f32]) -> Option<Vec<f32>> {
    let min = envelope.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = envelope.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return None;
    }
    Some(envelope.iter().map(|v| (v - min) / range).collect())
}

/// Window sizes (in frames) and threshold for [`pick_peaks`].
#[derive(Debug, Clone, PartialEq)]
pub struct PeakPicking {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub wait: usize,
    pub delta: f32,
}

impl PeakPicking {
    /// 30 ms max window and refractory wait, 100 ms averaging window.
    pub fn for_rate(sample_rate: u32, hop_length: usize, delta: f32) -> Self {
        let frames = |seconds: f64| (seconds * sample_rate as f64 / hop_length as f64).floor() as usize;
        Self {
            pre_max: frames(0.03),
            post_max: 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            wait: frames(0.03),
            delta,
        }
    }
}

/// Frame `n` is a peak when it is the maximum of
/// `[n - pre_max, n + post_max)`, reaches the mean of
/// `[n - pre_avg, n + post_avg)` plus `delta`, and comes more than
/// `wait` frames after the previous peak.
pub fn pick_peaks(envelope: &[f32], params: &PeakPicking) -> Vec<usize> {
    let n = envelope.len();
    let mut peaks: Vec<usize> = Vec::new();

    for i in 0..n {
        let max_window = &envelope[i.saturating_sub(params.pre_max)..(i + params.post_max).min(n)];
        let local_max = max_window.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if envelope[i] < local_max {
            continue;
        }

        let avg_window = &envelope[i.saturating_sub(params.pre_avg)..(i + params.post_avg).min(n)];
        let local_mean = avg_window.iter().sum::<f32>() / avg_window.len() as f32;
        if envelope[i] < local_mean + params.delta {
            continue;
        }

        if peaks.last().is_none_or(|&last| i > last + params.wait) {
            peaks.push(i);
        }
    }
    peaks
}
