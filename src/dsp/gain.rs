//! Gain Effect
//!
//! Flat dB gain applied uniformly to every sample.

use serde_json::{json, Value};

use crate::dsp::effect::Effect;
use crate::engine::{db_to_linear, SampleBuffer};

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
pub const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
pub const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Gain Effect
// ============================================================================

/// Flat gain stage
///
/// # Parameters
/// - `gain_db`: Gain in decibels (-96 to +24 dB)
///
/// # Example
/// ```
/// use refmaster::dsp::{Effect, Gain};
/// use refmaster::engine::SampleBuffer;
///
/// let mut gain = Gain::new(6.0);
/// let mut buffer = SampleBuffer::new(vec![0.25; 64], 44100).unwrap();
/// gain.process(&mut buffer);
/// assert!((buffer.peak() - 0.4988).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct Gain {
    gain_db: f32,
    gain_linear: f32,
}

impl Gain {
    /// Create a new gain stage, clamping to the valid range
    pub fn new(gain_db: f32) -> Self {
        let clamped = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        Self {
            gain_db: clamped,
            gain_linear: db_to_linear(clamped),
        }
    }

    /// Get the current gain in decibels
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Get the current linear gain multiplier
    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }

    /// Check if the gain leaves audio untouched
    pub fn is_unity(&self) -> bool {
        self.gain_db == 0.0
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Effect for Gain {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        // Unity gain skips the multiply entirely
        if self.is_unity() {
            return;
        }

        for sample in buffer.samples_mut() {
            *sample *= self.gain_linear;
        }
    }

    fn prepare(&mut self, _sample_rate: u32) {}

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "gain"
    }

    fn get_params(&self) -> Value {
        json!({
            "gain_db": self.gain_db,
            "gain_linear": self.gain_linear,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_buffer(value: f32, num_samples: usize) -> SampleBuffer {
        SampleBuffer::new(vec![value; num_samples], 44100).unwrap()
    }

    #[test]
    fn test_gain_clamping() {
        assert_eq!(Gain::new(100.0).gain_db(), MAX_GAIN_DB);
        assert_eq!(Gain::new(-200.0).gain_db(), MIN_GAIN_DB);
    }

    #[test]
    fn test_gain_process() {
        let mut gain = Gain::new(-6.0);
        let mut buffer = constant_buffer(0.5, 100);
        gain.process(&mut buffer);

        for &s in buffer.samples() {
            assert_relative_eq!(s, 0.5 * db_to_linear(-6.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_gain_process_unity_is_bit_exact() {
        let mut gain = Gain::new(0.0);
        let original = SampleBuffer::new(vec![0.123_456_7, -0.987_654_3, 0.5], 44100).unwrap();
        let mut buffer = original.clone();
        gain.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_gain_positive() {
        let mut gain = Gain::new(6.0);
        let mut buffer = constant_buffer(0.4, 10);
        gain.process(&mut buffer);
        assert_relative_eq!(buffer.peak(), 0.4 * 10.0_f32.powf(0.3), epsilon = 1e-5);
    }

    #[test]
    fn test_gain_empty_buffer() {
        let mut gain = Gain::new(12.0);
        let mut buffer = constant_buffer(0.0, 0);
        gain.process(&mut buffer);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_gain_get_params() {
        let gain = Gain::new(3.0);
        let params = gain.get_params();
        assert_eq!(params["gain_db"], 3.0);
        assert_eq!(gain.effect_type(), "gain");
    }
}
