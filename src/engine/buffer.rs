//! Sample Buffer
//!
//! Mono floating-point audio paired with its sample rate. Every pipeline
//! stage takes a buffer by reference and returns a new one.

use crate::error::{MasteringError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Peak ceiling enforced after the mastering chain
pub const SAFETY_PEAK: f32 = 0.98;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Root-mean-square of a sample slice, accumulated in f64
///
/// Returns 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Peak absolute amplitude of a sample slice
///
/// Returns 0.0 for an empty slice.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Mono audio buffer
///
/// Samples are normalized to roughly [-1, 1]. The sample rate is always
/// positive; an empty buffer is legal.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from samples and a sample rate
    ///
    /// # Errors
    /// * `InvalidSampleRate` - If `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(MasteringError::InvalidSampleRate { rate: sample_rate });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a silent buffer of the given length
    pub fn silent(num_samples: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![0.0; num_samples], sample_rate)
    }

    /// Build a buffer that shares this buffer's sample rate
    pub(crate) fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Read-only view of the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable view of the samples
    pub(crate) fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Linear RMS level
    pub fn rms(&self) -> f64 {
        rms(&self.samples)
    }

    /// Linear peak level
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }

    /// RMS level in dBFS
    pub fn rms_db(&self) -> f32 {
        linear_to_db(self.rms() as f32)
    }

    /// Peak level in dBFS
    pub fn peak_db(&self) -> f32 {
        linear_to_db(self.peak())
    }

    /// Return a copy with every sample multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        self.with_samples(
            self.samples
                .iter()
                .map(|&s| (s as f64 * factor) as f32)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_buffer() {
        let buf = SampleBuffer::new(vec![0.0; 1000], 44100).unwrap();
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.sample_rate(), 44100);
        assert_relative_eq!(buf.duration_secs(), 1000.0 / 44100.0);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let result = SampleBuffer::new(vec![0.1, 0.2], 0);
        assert!(matches!(
            result,
            Err(MasteringError::InvalidSampleRate { rate: 0 })
        ));
    }

    #[test]
    fn test_empty_buffer_is_legal() {
        let buf = SampleBuffer::new(Vec::new(), 48000).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.rms(), 0.0);
        assert_eq!(buf.peak(), 0.0);
        assert_eq!(buf.peak_db(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_rms_of_constant() {
        let buf = SampleBuffer::new(vec![0.25; 512], 44100).unwrap();
        assert_relative_eq!(buf.rms(), 0.25, epsilon = 1e-7);
    }

    #[test]
    fn test_rms_db_of_sine() {
        let samples: Vec<f32> = (0..48000)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin())
            .collect();
        let buf = SampleBuffer::new(samples, 48000).unwrap();
        // RMS of a full-scale sine is 1/sqrt(2) = -3.01 dB
        assert!((buf.rms_db() - (-3.01)).abs() < 0.05);
    }

    #[test]
    fn test_peak_uses_absolute_value() {
        let buf = SampleBuffer::new(vec![0.1, -0.7, 0.5], 8000).unwrap();
        assert_eq!(buf.peak(), 0.7);
    }

    #[test]
    fn test_scaled_keeps_rate_and_length() {
        let buf = SampleBuffer::new(vec![0.5, -0.5], 22050).unwrap();
        let scaled = buf.scaled(0.5);
        assert_eq!(scaled.samples(), &[0.25, -0.25]);
        assert_eq!(scaled.sample_rate(), 22050);
        // Input untouched
        assert_eq!(buf.samples(), &[0.5, -0.5]);
    }

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0), 0.501_187, epsilon = 1e-5);
        assert_relative_eq!(linear_to_db(1.0), 0.0);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }
}
