//! Compressor effect
//!
//! Feed-forward peak compressor. Signal above the threshold is reduced by
//! the ratio; attack and release shape a one-pole gain-reduction envelope so
//! long releases recover smoothly instead of pumping.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dsp::effect::Effect;
use crate::engine::{db_to_linear, SampleBuffer};
use crate::error::{MasteringError, Result};

/// Level floor used when converting silence to dB
const FLOOR_DB: f32 = -96.0;

/// Shortest attack or release the envelope accepts
const MIN_TIME_MS: f32 = 0.01;

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB, at most 0
    pub threshold_db: f32,
    /// Compression ratio, at least 1.0 (1:1)
    pub ratio: f32,
    /// Attack time in milliseconds
    pub attack_ms: f32,
    /// Release time in milliseconds
    pub release_ms: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -25.0,
            ratio: 1.5,
            attack_ms: 20.0,
            release_ms: 150.0,
        }
    }
}

impl CompressorParams {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        let invalid = |param: &str, value: f32, expected: &str| MasteringError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        if !self.threshold_db.is_finite() || self.threshold_db > 0.0 {
            return Err(invalid("compressor_threshold_db", self.threshold_db, "at most 0 dB"));
        }
        if !self.ratio.is_finite() || self.ratio < 1.0 {
            return Err(invalid("compressor_ratio", self.ratio, "at least 1.0"));
        }
        if !self.attack_ms.is_finite() || self.attack_ms <= 0.0 {
            return Err(invalid("compressor_attack_ms", self.attack_ms, "a positive time in ms"));
        }
        if !self.release_ms.is_finite() || self.release_ms <= 0.0 {
            return Err(invalid(
                "compressor_release_ms",
                self.release_ms,
                "a positive time in ms",
            ));
        }
        Ok(())
    }

    /// Clamp parameters into their valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.min(0.0);
        self.ratio = self.ratio.max(1.0);
        self.attack_ms = self.attack_ms.max(MIN_TIME_MS);
        self.release_ms = self.release_ms.max(MIN_TIME_MS);
    }
}

/// Compressor dynamics processor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    sample_rate: u32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current gain reduction (linear, 1.0 = none)
    gain_reduction: f32,
}

impl Compressor {
    /// Create a compressor; out-of-range parameters are clamped
    pub fn new(params: CompressorParams) -> Self {
        let mut comp = Self {
            params,
            sample_rate: 44100,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain_reduction: 1.0,
        };
        comp.params.clamp();
        comp.update_coefficients();
        comp
    }

    /// Get the current parameters
    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Current gain reduction in dB (0 or negative), for metering
    pub fn gain_reduction_db(&self) -> f32 {
        Self::linear_to_db(self.gain_reduction)
    }

    /// Update attack/release coefficients from sample rate and time constants
    fn update_coefficients(&mut self) {
        // coeff = exp(-1 / time_in_samples)
        let attack_samples = (self.params.attack_ms / 1000.0) * self.sample_rate as f32;
        let release_samples = (self.params.release_ms / 1000.0) * self.sample_rate as f32;

        self.attack_coeff = if attack_samples > 0.0 {
            (-1.0 / attack_samples).exp()
        } else {
            0.0
        };

        self.release_coeff = if release_samples > 0.0 {
            (-1.0 / release_samples).exp()
        } else {
            0.0
        };
    }

    /// Gain reduction in dB (0 or negative) for an input level, hard knee
    fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.params.threshold_db;
        if input_db <= threshold {
            0.0
        } else {
            // output = threshold + (input - threshold) / ratio
            (threshold + (input_db - threshold) / self.params.ratio) - input_db
        }
    }

    fn linear_to_db(linear: f32) -> f32 {
        if linear > 0.0 {
            20.0 * linear.log10()
        } else {
            FLOOR_DB
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressorParams::default())
    }
}

impl Effect for Compressor {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        for sample in buffer.samples_mut() {
            let input_db = Self::linear_to_db(sample.abs());
            let target_gr = db_to_linear(self.compute_gain_reduction_db(input_db));

            // Gain going down attacks, gain going up releases
            let coeff = if target_gr < self.gain_reduction {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain_reduction = coeff * self.gain_reduction + (1.0 - coeff) * target_gr;

            *sample *= self.gain_reduction;
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.gain_reduction = 1.0;
    }

    fn effect_type(&self) -> &'static str {
        "compressor"
    }

    fn get_params(&self) -> Value {
        json!({
            "threshold_db": self.params.threshold_db,
            "ratio": self.params.ratio,
            "attack_ms": self.params.attack_ms,
            "release_ms": self.params.release_ms,
        })
    }
}
