//! RMS level matching
//!
//! Scales a target buffer so its RMS approaches the reference's, minus a
//! headroom margin that leaves room for the mastering chain.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{resample, SampleBuffer};
use crate::error::{MasteringError, Result};

/// Default headroom factor applied on top of the RMS ratio
pub const DEFAULT_HEADROOM: f64 = 0.8;

/// Conditions that turn level matching into a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelWarning {
    /// Target RMS is zero, nothing to scale
    SilentTarget,
    /// Reference RMS is zero, scaling would zero the target
    SilentReference,
    /// Target or reference holds no samples
    EmptyInput,
    /// Session has no reference track
    NoReference,
}

/// Outcome of a level match
#[derive(Debug, Clone)]
pub struct LevelMatch {
    /// Leveled target, at the reference's sample rate
    pub buffer: SampleBuffer,
    pub target_rms: f64,
    pub reference_rms: f64,
    /// Factor applied to every sample, `None` when nothing was applied
    pub adjustment: Option<f64>,
    pub warning: Option<LevelWarning>,
}

impl LevelMatch {
    /// Pass-through result used when no reference is available
    pub fn unmatched(target: &SampleBuffer) -> Self {
        Self {
            buffer: target.clone(),
            target_rms: target.rms(),
            reference_rms: 0.0,
            adjustment: None,
            warning: Some(LevelWarning::NoReference),
        }
    }
}

/// RMS level matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelMatcher {
    headroom: f64,
}

impl Default for LevelMatcher {
    fn default() -> Self {
        Self {
            headroom: DEFAULT_HEADROOM,
        }
    }
}

impl LevelMatcher {
    /// Create a matcher with a custom headroom factor
    ///
    /// # Errors
    /// * `InvalidParameter` - If `headroom` is not a finite positive number
    pub fn new(headroom: f64) -> Result<Self> {
        if !headroom.is_finite() || headroom <= 0.0 {
            return Err(MasteringError::InvalidParameter {
                param: "headroom".to_string(),
                value: headroom.to_string(),
                expected: "a positive factor, typically 0.8".to_string(),
            });
        }
        Ok(Self { headroom })
    }

    /// Headroom factor
    pub fn headroom(&self) -> f64 {
        self.headroom
    }

    /// Match `target` to `reference`
    ///
    /// The target is first resampled to the reference's rate if the two
    /// differ. A silent or empty side makes the match a no-op and is
    /// reported through [`LevelMatch::warning`].
    ///
    /// # Errors
    /// * `Resample` - If the rate conversion fails
    pub fn match_level(
        &self,
        target: &SampleBuffer,
        reference: &SampleBuffer,
    ) -> Result<LevelMatch> {
        let target = if target.sample_rate() != reference.sample_rate() {
            debug!(
                from = target.sample_rate(),
                to = reference.sample_rate(),
                "Resampling target to reference rate"
            );
            resample(target, reference.sample_rate())?
        } else {
            target.clone()
        };

        let target_rms = target.rms();
        let reference_rms = reference.rms();

        let warning = if target.is_empty() || reference.is_empty() {
            Some(LevelWarning::EmptyInput)
        } else if target_rms == 0.0 {
            Some(LevelWarning::SilentTarget)
        } else if reference_rms == 0.0 {
            Some(LevelWarning::SilentReference)
        } else {
            None
        };

        if let Some(warning) = warning {
            warn!(?warning, target_rms, reference_rms, "Level matching skipped");
            return Ok(LevelMatch {
                buffer: target,
                target_rms,
                reference_rms,
                adjustment: None,
                warning: Some(warning),
            });
        }

        let adjustment = (reference_rms / target_rms) * self.headroom;
        debug!(target_rms, reference_rms, adjustment, "Level matched");

        Ok(LevelMatch {
            buffer: target.scaled(adjustment),
            target_rms,
            reference_rms,
            adjustment: Some(adjustment),
            warning: None,
        })
    }
}

/// Match `target` to `reference` with the default headroom
pub fn match_level(target: &SampleBuffer, reference: &SampleBuffer) -> Result<SampleBuffer> {
    Ok(LevelMatcher::default().match_level(target, reference)?.buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use approx::assert_relative_eq;

    fn constant(value: f32, len: usize, rate: u32) -> SampleBuffer {
        SampleBuffer::new(vec![value; len], rate).unwrap()
    }

    #[test]
    fn test_constant_buffers() {
        let target = constant(0.1, 44100, 44100);
        let reference = constant(0.2, 44100, 44100);

        let result = LevelMatcher::default().match_level(&target, &reference).unwrap();

        assert_relative_eq!(result.target_rms, 0.1, epsilon = 1e-6);
        assert_relative_eq!(result.reference_rms, 0.2, epsilon = 1e-6);
        assert_relative_eq!(result.adjustment.unwrap(), 1.6, epsilon = 1e-5);
        assert_eq!(result.buffer.len(), 44100);
        for &s in result.buffer.samples() {
            assert_relative_eq!(s, 0.16, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_self_match_applies_headroom_exactly() {
        let tone = generate_test_tone(440.0, 0.5, 0.25, 44100).unwrap();
        let result = LevelMatcher::default().match_level(&tone, &tone).unwrap();

        assert_eq!(result.adjustment, Some(0.8));
        assert_relative_eq!(result.buffer.rms(), tone.rms() * 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_silent_target_is_unchanged() {
        let silent = SampleBuffer::silent(1000, 44100).unwrap();
        let reference = constant(0.3, 1000, 44100);

        let result = LevelMatcher::default().match_level(&silent, &reference).unwrap();

        assert_eq!(result.warning, Some(LevelWarning::SilentTarget));
        assert_eq!(result.adjustment, None);
        assert_eq!(result.buffer, silent);
        assert!(result.buffer.samples().iter().all(|s| !s.is_nan()));
    }

    #[test]
    fn test_silent_reference_is_noop() {
        let target = constant(0.3, 1000, 44100);
        let silent = SampleBuffer::silent(1000, 44100).unwrap();

        let result = LevelMatcher::default().match_level(&target, &silent).unwrap();
        assert_eq!(result.warning, Some(LevelWarning::SilentReference));
        assert_eq!(result.buffer, target);
    }

    #[test]
    fn test_empty_target() {
        let empty = SampleBuffer::new(Vec::new(), 44100).unwrap();
        let reference = constant(0.3, 1000, 44100);

        let result = LevelMatcher::default().match_level(&empty, &reference).unwrap();
        assert_eq!(result.warning, Some(LevelWarning::EmptyInput));
        assert!(result.buffer.is_empty());
    }

    #[test]
    fn test_rate_mismatch_resamples_target() {
        let target = generate_test_tone(440.0, 0.25, 0.5, 48000).unwrap();
        let reference = generate_test_tone(440.0, 0.5, 0.5, 44100).unwrap();

        let result = LevelMatcher::default().match_level(&target, &reference).unwrap();

        assert_eq!(result.buffer.sample_rate(), 44100);
        assert_eq!(result.buffer.len(), 22050);
        // Twice as quiet, so roughly 2 * 0.8
        assert!((result.adjustment.unwrap() - 1.6).abs() < 0.05);
    }

    #[test]
    fn test_custom_headroom() {
        let target = constant(0.1, 100, 44100);
        let reference = constant(0.2, 100, 44100);
        let matcher = LevelMatcher::new(1.0).unwrap();

        let leveled = matcher.match_level(&target, &reference).unwrap().buffer;
        assert_relative_eq!(leveled.rms(), 0.2, epsilon = 1e-6);

        assert!(LevelMatcher::new(0.0).is_err());
        assert!(LevelMatcher::new(f64::NAN).is_err());
    }

    #[test]
    fn test_unmatched_passes_through() {
        let target = constant(0.1, 100, 44100);
        let result = LevelMatch::unmatched(&target);
        assert_eq!(result.warning, Some(LevelWarning::NoReference));
        assert_eq!(result.buffer, target);
    }

    #[test]
    fn test_free_function() {
        let target = constant(0.1, 100, 44100);
        let reference = constant(0.2, 100, 44100);
        let leveled = match_level(&target, &reference).unwrap();
        assert_relative_eq!(leveled.samples()[0], 0.16, epsilon = 1e-6);
    }
}
