//! # Fast Fourier Transform (FFT) Module
//!
//! Framing and spectral helpers shared by the pitch estimator and the
//! onset detector. Frames are centred: frame `i` covers the samples
//! around `i * hop_length`, zero padded past either end of the signal,
//! so both analyses index the same instants.
//!
//! ## Features
//! - Centred framing with zero padding
//! - DC offset removal and Hann windowing
//! - Power spectrogram using RustFFT

use rustfft::{FftPlanner, num_complex::Complex};

/// Number of centred frames for a signal of `len` samples.
pub fn frame_count(len: usize, hop_length: usize) -> usize {
    1 + len / hop_length
}

/// Copies out the `frame_length` samples centred on `index * hop_length`.
///
/// Positions before the start or past the end of `samples` read as zero.
pub fn centered_frame(
    samples: &[f32],
    index: usize,
    frame_length: usize,
    hop_length: usize,
) -> Vec<f32> {
    let center = (index * hop_length) as isize;
    let start = center - (frame_length / 2) as isize;
    (0..frame_length as isize)
        .map(|offset| {
            let pos = start + offset;
            if pos >= 0 && (pos as usize) < samples.len() {
                samples[pos as usize]
            } else {
                0.0
            }
        })
        .collect()
}

/// Removes the DC offset from a signal by making its average value zero.
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 { return; }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Computes the power spectrum of every centred frame.
///
/// Each frame is DC-corrected and Hann windowed before the transform.
/// Only the non-negative frequency bins (`frame_length / 2 + 1`) are kept.
///
/// # Returns
/// * `Vec<Vec<f32>>` - One row of bin powers per frame
pub fn power_spectrogram(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<Vec<f32>> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_length);
    let bins = frame_length / 2 + 1;

    (0..frame_count(samples.len(), hop_length))
        .map(|index| {
            let mut frame = centered_frame(samples, index, frame_length, hop_length);
            remove_dc_offset(&mut frame);
            apply_hann_window(&mut frame);

            let mut buffer: Vec<Complex<f32>> = frame
                .into_iter()
                .map(|sample| Complex { re: sample, im: 0.0 })
                .collect();
            fft.process(&mut buffer);

            buffer.iter().take(bins).map(|c| c.norm_sqr()).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_count_is_centred() {
        assert_eq!(frame_count(0, 512), 1);
        assert_eq!(frame_count(511, 512), 1);
        assert_eq!(frame_count(512, 512), 2);
        assert_eq!(frame_count(22050, 512), 44);
    }

    #[test]
    fn test_centered_frame_pads_edges() {
        let samples: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        assert_eq!(centered_frame(&samples, 0, 4, 2), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(centered_frame(&samples, 2, 4, 2), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(centered_frame(&samples, 4, 4, 2), vec![7.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dc_offset_removed() {
        let mut signal = vec![1.0, 2.0, 3.0];
        remove_dc_offset(&mut signal);
        assert_relative_eq!(signal.iter().sum::<f32>(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_spectrogram_peak_follows_tone() {
        let sample_rate = 8000.0;
        let freq = 1000.0;
        let samples: Vec<f32> = (0..4096)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / sample_rate).sin())
            .collect();
        let spec = power_spectrogram(&samples, 256, 128);
        assert_eq!(spec.len(), frame_count(samples.len(), 128));
        assert_eq!(spec[0].len(), 129);

        // 1000 Hz at 8 kHz with 256 bins per frame lands on bin 32.
        let middle = &spec[spec.len() / 2];
        let peak = middle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        assert_eq!(peak, 32);
    }
}
