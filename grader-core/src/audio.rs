//! # Audio Input Module
//!
//! Holds a captured recording as a mono sample buffer and loads one from
//! a WAV file. The whole recording is analysed at once; there is no
//! streaming input.

use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::error::{GradeError, Result};

/// A complete mono recording.
///
/// The buffer is immutable once built; analysis only ever borrows it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a buffer from mono samples.
    ///
    /// # Returns
    /// * `Err(GradeError::InvalidSampleRate)` if `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(GradeError::InvalidSampleRate(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(Self { samples, sample_rate })
    }

    /// Creates a buffer from `f64` samples, as decoded from JSON.
    pub fn from_f64(samples: &[f64], sample_rate: u32) -> Result<Self> {
        Self::new(samples.iter().map(|&s| s as f32).collect(), sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the recording in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Loads a WAV file and mixes it down to mono.
///
/// Integer PCM is scaled to `[-1, 1]`; multi-channel audio is averaged
/// frame by frame.
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<SampleBuffer> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    log::debug!(
        "Loaded {} mono samples at {} Hz ({} channel source)",
        mono.len(),
        spec.sample_rate,
        channels
    );

    SampleBuffer::new(mono, spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hound::{WavSpec, WavWriter};

    fn temp_wav(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("grader_core_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 4], 0),
            Err(GradeError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 33075], 22050).unwrap();
        assert_relative_eq!(buffer.duration(), 1.5);
        assert!(SampleBuffer::new(Vec::new(), 22050).unwrap().is_empty());
    }

    #[test]
    fn test_load_stereo_int_wav_mixes_to_mono() {
        let path = temp_wav("stereo");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = load_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.len(), 10);
        for &s in buffer.samples() {
            assert_relative_eq!(s, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_missing_file_is_wav_error() {
        let result = load_wav(temp_wav("does_not_exist"));
        assert!(matches!(result, Err(GradeError::Wav(_))));
    }
}
