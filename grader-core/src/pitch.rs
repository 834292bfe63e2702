//! # Pitch Detection Module
//!
//! Turns a recording into a pitch contour: one fundamental frequency
//! estimate per analysis frame, or `None` where the frame is silent or
//! aperiodic.
//!
//! ## Features
//! - `PitchContourEstimator` trait so callers can inject their own contours
//! - YIN estimator with an FFT-based difference function
//! - Amplitude gating and clarity checking to reject silence and noise
//! - Parabolic interpolation for sub-sample accuracy

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

use crate::audio::SampleBuffer;
use crate::config::AnalysisConfig;
use crate::error::{GradeError, Result};
use crate::fft::{centered_frame, frame_count};

/// Per-frame fundamental frequency estimates in Hz.
///
/// Frame `i` is centred on sample `i * hop_length`; `None` marks an
/// unvoiced frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchContour {
    frames: Vec<Option<f32>>,
}

impl PitchContour {
    pub fn new(frames: Vec<Option<f32>>) -> Self {
        Self { frames }
    }

    /// Estimate for one frame; `None` if unvoiced or out of range.
    pub fn get(&self, frame: usize) -> Option<f32> {
        self.frames.get(frame).copied().flatten()
    }

    pub fn frames(&self) -> &[Option<f32>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }
}

impl From<Vec<Option<f32>>> for PitchContour {
    fn from(frames: Vec<Option<f32>>) -> Self {
        Self::new(frames)
    }
}

/// Produces a pitch contour aligned to `hop_length`.
pub trait PitchContourEstimator {
    fn estimate(&self, buffer: &SampleBuffer, hop_length: usize) -> Result<PitchContour>;
}

/// A frame-by-frame YIN pitch estimator.
///
/// Enhancements over plain YIN:
/// - Octave error prevention: the first dip within `dip_tolerance` of the
///   deepest one wins, so a lag of one period beats two periods
/// - Noise rejection using a clarity threshold on the chosen dip
/// - Amplitude gating to filter out silence
#[derive(Debug, Clone)]
pub struct YinEstimator {
    fmin: f64,
    fmax: f64,
    frame_length: usize,
    amplitude_threshold: f32,
    dip_tolerance: f32,
    clarity_threshold: f32,
}

impl YinEstimator {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fmin: config.fmin.hz()?,
            fmax: config.fmax.hz()?,
            frame_length: config.frame_length,
            amplitude_threshold: config.amplitude_threshold,
            dip_tolerance: config.dip_tolerance,
            clarity_threshold: config.clarity_threshold,
        })
    }

    /// Lag search range `(min_lag, max_lag)` in samples for a sample rate.
    /// Fails with `Analysis` when the buffer's rate leaves no usable range.
    fn lag_range(&self, sample_rate: u32) -> Result<(usize, usize)> {
        let sr = sample_rate as f64;
        let min_lag = ((sr / self.fmax).floor() as usize).max(2);
        let max_lag = (sr / self.fmin).ceil() as usize;
        if max_lag + 2 > self.frame_length {
            return Err(GradeError::Analysis(format!(
                "frame_length {} is too short for fmin {:.2} Hz at {} Hz (needs more than {} samples)",
                self.frame_length,
                self.fmin,
                sample_rate,
                max_lag + 1
            )));
        }
        if min_lag >= max_lag {
            return Err(GradeError::Analysis(format!(
                "pitch range {:.2}-{:.2} Hz is empty at {} Hz",
                self.fmin, self.fmax, sample_rate
            )));
        }
        Ok((min_lag, max_lag))
    }
}

impl PitchContourEstimator for YinEstimator {
    fn estimate(&self, buffer: &SampleBuffer, hop_length: usize) -> Result<PitchContour> {
        if hop_length == 0 {
            return Err(GradeError::InvalidConfig("hop_length must be positive".into()));
        }
        let sample_rate = buffer.sample_rate();
        let (min_lag, max_lag) = self.lag_range(sample_rate)?;
        let diff = DifferenceFunction::new(self.frame_length, max_lag);

        let frames = (0..frame_count(buffer.len(), hop_length))
            .map(|index| {
                let frame = centered_frame(buffer.samples(), index, self.frame_length, hop_length);

                // --- Noise Gate: Calculate RMS to filter out silence/noise ---
                let rms = (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
                if rms < self.amplitude_threshold {
                    return None;
                }

                let cmnd = cumulative_mean_normalized(&diff.compute(&frame));
                let period = find_period(&cmnd, min_lag, max_lag, self.dip_tolerance, self.clarity_threshold)?;
                let frequency = sample_rate as f64 / period as f64;

                if frequency.is_finite() && frequency >= self.fmin && frequency <= self.fmax {
                    Some(frequency as f32)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        let contour = PitchContour::new(frames);
        log::debug!(
            "Pitch contour: {} frames, {} voiced",
            contour.len(),
            contour.voiced_count()
        );
        Ok(contour)
    }
}

/// YIN difference function evaluated through FFT cross-correlation.
///
/// For lag `tau` it sums `(x[j] - x[j + tau])^2` over the first
/// `frame_length - max_lag` samples of the frame.
struct DifferenceFunction {
    window: usize,
    max_lag: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl DifferenceFunction {
    fn new(frame_length: usize, max_lag: usize) -> Self {
        let fft_len = frame_length.next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            window: frame_length - max_lag,
            max_lag,
            fft_len,
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
        }
    }

    fn compute(&self, frame: &[f32]) -> Vec<f32> {
        let to_complex = |samples: &[f32]| -> Vec<Complex<f32>> {
            let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; self.fft_len];
            for (slot, &s) in buffer.iter_mut().zip(samples) {
                slot.re = s;
            }
            buffer
        };

        // Cross-correlation of the head window against the whole frame.
        // Lags never exceed `max_lag`, so the circular product does not wrap.
        let mut head = to_complex(&frame[..self.window]);
        let mut full = to_complex(frame);
        self.forward.process(&mut head);
        self.forward.process(&mut full);
        let mut product: Vec<Complex<f32>> = head
            .iter()
            .zip(&full)
            .map(|(h, f)| h.conj() * f)
            .collect();
        self.inverse.process(&mut product);
        let scale = 1.0 / self.fft_len as f32;

        let mut prefix = Vec::with_capacity(frame.len() + 1);
        prefix.push(0.0f64);
        for &s in frame {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + (s as f64) * (s as f64));
        }
        let head_energy = prefix[self.window];

        (0..=self.max_lag)
            .map(|tau| {
                let lagged_energy = prefix[tau + self.window] - prefix[tau];
                let cross = (product[tau].re * scale) as f64;
                (head_energy + lagged_energy - 2.0 * cross).max(0.0) as f32
            })
            .collect()
    }
}

/// Cumulative mean normalised difference (YIN step 3).
fn cumulative_mean_normalized(diff: &[f32]) -> Vec<f32> {
    let mut cmnd = vec![1.0; diff.len()];
    let mut running_sum = 0.0;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        if running_sum > 0.0 {
            cmnd[tau] = diff[tau] * tau as f32 / running_sum;
        }
    }
    cmnd
}

/// Picks the period from a normalised difference function (YIN steps 4-6).
///
/// The threshold sits `tolerance` above the deepest value in range; the
/// first interior trough under it is descended to its bottom and refined
/// by parabolic interpolation.
///
/// # Returns
/// * `Some(period)` - Period in (fractional) samples
/// * `None` - No clear trough inside `[min_lag, max_lag]`
fn find_period(
    cmnd: &[f32],
    min_lag: usize,
    max_lag: usize,
    tolerance: f32,
    clarity_threshold: f32,
) -> Option<f32> {
    let min_val = cmnd[min_lag..=max_lag]
        .iter()
        .cloned()
        .fold(f32::INFINITY, f32::min);
    let threshold = min_val + tolerance;

    let mut period = None;
    let mut tau = min_lag;
    while tau < max_lag {
        if cmnd[tau] < threshold {
            while tau < max_lag && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            // A trough cut off by either edge of the range belongs to a
            // pitch outside [fmin, fmax].
            if tau < max_lag && cmnd[tau - 1] >= cmnd[tau] {
                period = Some(tau);
                break;
            }
            while tau < max_lag && cmnd[tau] < threshold {
                tau += 1;
            }
            continue;
        }
        tau += 1;
    }

    let period = period?;
    if cmnd[period] > clarity_threshold {
        return None;
    }

    // --- Parabolic interpolation for better precision ---
    let y1 = cmnd[period - 1];
    let y2 = cmnd[period];
    let y3 = cmnd[period + 1];
    let denominator = y1 - 2.0 * y2 + y3;
    if denominator.abs() > f32::EPSILON {
        let shift = ((y1 - y3) / (2.0 * denominator)).clamp(-0.5, 0.5);
        Some(period as f32 + shift)
    } else {
        Some(period as f32)
    }
}
