//! Mastering chain
//!
//! Stages run in a fixed order, each over the whole buffer:
//! 1. High-pass filter (optional)
//! 2. Compressor
//! 3. Gain
//! 4. Low-pass filter (optional)
//! 5. Limiter
//!
//! A safety normalization runs last and only ever scales down.
//! Which stages exist is decided up front by the caller through a
//! [`StageSet`]; nothing is probed at run time.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::dsp::compressor::{Compressor, CompressorParams};
use crate::dsp::effect::Effect;
use crate::dsp::filter::PassFilter;
use crate::dsp::gain::{Gain, MAX_GAIN_DB, MIN_GAIN_DB};
use crate::dsp::limiter::Limiter;
use crate::engine::{SampleBuffer, SAFETY_PEAK};
use crate::error::{MasteringError, Result};

// ============================================================================
// Parameters
// ============================================================================

/// Mastering chain configuration
///
/// Missing fields deserialize to the defaults below, and the short key names
/// used by the web form (`compressor_threshold`, `limiter_release`, ...) are
/// accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringParams {
    pub use_compressor: bool,
    #[serde(alias = "compressor_threshold")]
    pub compressor_threshold_db: f32,
    pub compressor_ratio: f32,
    #[serde(alias = "compressor_attack")]
    pub compressor_attack_ms: f32,
    #[serde(alias = "compressor_release")]
    pub compressor_release_ms: f32,
    /// Flat gain; 0 skips the stage
    pub gain_db: f32,
    pub use_limiter: bool,
    #[serde(alias = "limiter_threshold")]
    pub limiter_threshold_db: f32,
    #[serde(alias = "limiter_release")]
    pub limiter_release_ms: f32,
    pub highpass_hz: Option<f32>,
    pub lowpass_hz: Option<f32>,
}

impl Default for MasteringParams {
    fn default() -> Self {
        Self {
            use_compressor: true,
            compressor_threshold_db: -25.0,
            compressor_ratio: 1.5,
            compressor_attack_ms: 20.0,
            compressor_release_ms: 150.0,
            gain_db: 0.0,
            use_limiter: true,
            limiter_threshold_db: -0.5,
            limiter_release_ms: 100.0,
            highpass_hz: None,
            lowpass_hz: None,
        }
    }
}

impl MasteringParams {
    /// Gentle first-pass settings
    pub fn basic() -> Self {
        Self {
            gain_db: 1.0,
            ..Self::default()
        }
    }

    /// Tighter dynamics with a 30 Hz / 18 kHz band limit
    pub fn professional() -> Self {
        Self {
            use_compressor: true,
            compressor_threshold_db: -24.0,
            compressor_ratio: 1.8,
            compressor_attack_ms: 10.0,
            compressor_release_ms: 200.0,
            gain_db: 1.0,
            use_limiter: true,
            limiter_threshold_db: -0.8,
            limiter_release_ms: 50.0,
            highpass_hz: Some(30.0),
            lowpass_hz: Some(18000.0),
        }
    }

    /// Compressor settings carried by these params
    pub fn compressor(&self) -> CompressorParams {
        CompressorParams {
            threshold_db: self.compressor_threshold_db,
            ratio: self.compressor_ratio,
            attack_ms: self.compressor_attack_ms,
            release_ms: self.compressor_release_ms,
        }
    }

    /// Validate the settings of every enabled stage
    pub fn validate(&self) -> Result<()> {
        let invalid = |param: &str, value: f32, expected: &str| MasteringError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        if self.use_compressor {
            self.compressor().validate()?;
        }
        if !self.gain_db.is_finite() || !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&self.gain_db) {
            return Err(invalid("gain_db", self.gain_db, "-96 to +24 dB"));
        }
        if self.use_limiter {
            if !self.limiter_threshold_db.is_finite() || self.limiter_threshold_db > 0.0 {
                return Err(invalid(
                    "limiter_threshold_db",
                    self.limiter_threshold_db,
                    "at most 0 dB",
                ));
            }
            if !self.limiter_release_ms.is_finite() || self.limiter_release_ms <= 0.0 {
                return Err(invalid(
                    "limiter_release_ms",
                    self.limiter_release_ms,
                    "a positive time in ms",
                ));
            }
        }
        let cutoffs = [("highpass_hz", self.highpass_hz), ("lowpass_hz", self.lowpass_hz)];
        for (param, cutoff) in cutoffs {
            if let Some(hz) = cutoff {
                if !hz.is_finite() || hz <= 0.0 {
                    return Err(invalid(param, hz, "a positive frequency in Hz"));
                }
            }
        }
        Ok(())
    }
}

/// Named parameter presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Basic,
    Professional,
}

impl Preset {
    /// Parameters for this preset
    pub fn params(self) -> MasteringParams {
        match self {
            Preset::Basic => MasteringParams::basic(),
            Preset::Professional => MasteringParams::professional(),
        }
    }
}

// ============================================================================
// Stage capabilities
// ============================================================================

/// Stages the caller allows the chain to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSet {
    pub highpass: bool,
    pub compressor: bool,
    pub gain: bool,
    pub lowpass: bool,
    pub limiter: bool,
}

impl StageSet {
    /// Every stage available
    pub const ALL: StageSet = StageSet {
        highpass: true,
        compressor: true,
        gain: true,
        lowpass: true,
        limiter: true,
    };

    /// Dynamics only, no filters
    pub const DYNAMICS: StageSet = StageSet {
        highpass: false,
        compressor: true,
        gain: true,
        lowpass: false,
        limiter: true,
    };
}

impl Default for StageSet {
    fn default() -> Self {
        Self::ALL
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Ordered stage list built from params and a capability set
pub struct MasteringChain {
    stages: Vec<Box<dyn Effect>>,
}

impl MasteringChain {
    /// Build a chain
    ///
    /// A stage is included only when the capability set allows it and the
    /// params enable it. Zero gain never adds a gain stage.
    ///
    /// # Errors
    /// * `InvalidParameter` - If the params fail validation
    pub fn build(params: &MasteringParams, stages: StageSet) -> Result<Self> {
        params.validate()?;

        let mut chain: Vec<Box<dyn Effect>> = Vec::with_capacity(5);

        if stages.highpass {
            if let Some(hz) = params.highpass_hz {
                chain.push(Box::new(PassFilter::high_pass(hz)));
            }
        }
        if stages.compressor && params.use_compressor {
            chain.push(Box::new(Compressor::new(params.compressor())));
        }
        if stages.gain && params.gain_db != 0.0 {
            chain.push(Box::new(Gain::new(params.gain_db)));
        }
        if stages.lowpass {
            if let Some(hz) = params.lowpass_hz {
                chain.push(Box::new(PassFilter::low_pass(hz)));
            }
        }
        if stages.limiter && params.use_limiter {
            chain.push(Box::new(Limiter::new(
                params.limiter_threshold_db,
                params.limiter_release_ms,
            )));
        }

        Ok(Self { stages: chain })
    }

    /// Stage identifiers in processing order
    pub fn stage_types(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.effect_type()).collect()
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Active stages and their parameters as JSON
    pub fn describe(&self) -> Value {
        Value::Array(
            self.stages
                .iter()
                .map(|s| json!({ "type": s.effect_type(), "params": s.get_params() }))
                .collect(),
        )
    }

    /// Run the chain over a copy of `input`
    ///
    /// Every stage is prepared for the input's sample rate and reset first,
    /// so repeated calls give identical results.
    ///
    /// # Errors
    /// * `DspOverflow` - If a stage produces NaN or infinite samples
    pub fn process(&mut self, input: &SampleBuffer) -> Result<SampleBuffer> {
        let mut buffer = input.clone();

        if buffer.is_empty() {
            debug!("Empty buffer, chain is a pass-through");
            return Ok(buffer);
        }

        for stage in &mut self.stages {
            stage.prepare(buffer.sample_rate());
            stage.reset();
            stage.process(&mut buffer);

            if buffer.samples().iter().any(|s| !s.is_finite()) {
                return Err(MasteringError::DspOverflow {
                    stage: stage.effect_type().to_string(),
                });
            }

            debug!(
                stage = stage.effect_type(),
                peak = buffer.peak(),
                "Stage processed"
            );
        }

        Ok(normalize_peak(&buffer, SAFETY_PEAK))
    }
}

/// Scale a buffer down so its peak is at most `ceiling`
///
/// Never amplifies. Empty and silent buffers pass through unchanged.
pub fn normalize_peak(buffer: &SampleBuffer, ceiling: f32) -> SampleBuffer {
    let peak = buffer.peak();
    if peak <= ceiling {
        return buffer.clone();
    }

    let scale = ceiling / peak;
    debug!(peak, ceiling, scale, "Safety normalization applied");

    buffer.with_samples(
        buffer
            .samples()
            .iter()
            // Rounding in the multiply may land a hair above the ceiling
            .map(|&s| (s * scale).clamp(-ceiling, ceiling))
            .collect(),
    )
}

/// Master a buffer with every stage available
///
/// Equivalent to `MasteringChain::build(params, StageSet::ALL)?.process(buffer)`.
pub fn master(buffer: &SampleBuffer, params: &MasteringParams) -> Result<SampleBuffer> {
    master_with(buffer, params, StageSet::ALL)
}

/// Master a buffer with an explicit capability set
pub fn master_with(
    buffer: &SampleBuffer,
    params: &MasteringParams,
    stages: StageSet,
) -> Result<SampleBuffer> {
    let mut chain = MasteringChain::build(params, stages)?;
    let output = chain.process(buffer)?;

    info!(
        stages = ?chain.stage_types(),
        input_peak = buffer.peak(),
        output_peak = output.peak(),
        "Mastering chain complete"
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn gain_only(gain_db: f32) -> MasteringParams {
        MasteringParams {
            use_compressor: false,
            gain_db,
            use_limiter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_stage_order_professional() {
        let chain = MasteringChain::build(&MasteringParams::professional(), StageSet::ALL).unwrap();
        assert_eq!(
            chain.stage_types(),
            vec!["highpass", "compressor", "gain", "lowpass", "limiter"]
        );
    }

    #[test]
    fn test_stage_set_excludes_filters() {
        let chain =
            MasteringChain::build(&MasteringParams::professional(), StageSet::DYNAMICS).unwrap();
        assert_eq!(chain.stage_types(), vec!["compressor", "gain", "limiter"]);
    }

    #[test]
    fn test_zero_gain_adds_no_stage() {
        let chain = MasteringChain::build(&MasteringParams::default(), StageSet::ALL).unwrap();
        assert_eq!(chain.stage_types(), vec!["compressor", "limiter"]);
    }

    #[test]
    fn test_basic_and_professional_share_one_builder() {
        let basic = MasteringChain::build(&Preset::Basic.params(), StageSet::ALL).unwrap();
        assert_eq!(basic.stage_types(), vec!["compressor", "gain", "limiter"]);
        assert_eq!(Preset::Professional.params(), MasteringParams::professional());
    }

    #[test]
    fn test_gain_six_db_no_normalization() {
        let buffer = SampleBuffer::new(vec![0.4, -0.2, 0.1, -0.4], 44100).unwrap();
        let out = master(&buffer, &gain_only(6.0)).unwrap();

        assert_relative_eq!(out.peak(), 0.4 * 10.0_f32.powf(6.0 / 20.0), epsilon = 1e-5);
        assert!((out.peak() - 0.798).abs() < 1e-3);
    }

    #[test]
    fn test_gain_twelve_db_triggers_normalization() {
        let buffer = SampleBuffer::new(vec![0.4, -0.2, 0.1, -0.4], 44100).unwrap();
        let out = master(&buffer, &gain_only(12.0)).unwrap();

        assert_relative_eq!(out.peak(), SAFETY_PEAK, epsilon = 1e-6);
        // Relative levels survive the scaling
        assert_relative_eq!(out.samples()[1] / out.samples()[0], -0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_output_never_exceeds_safety_peak() {
        let loud = generate_test_tone(440.0, 0.95, 0.5, 48000).unwrap();
        let params = MasteringParams {
            gain_db: 24.0,
            use_limiter: false,
            ..Default::default()
        };
        let out = master(&loud, &params).unwrap();
        assert!(out.peak() <= SAFETY_PEAK);
    }

    #[test]
    fn test_zero_gain_never_amplifies() {
        let tone = generate_test_tone(440.0, 0.6, 0.5, 44100).unwrap();
        let out = master(&tone, &MasteringParams::default()).unwrap();
        assert!(out.peak() <= tone.peak());
    }

    #[test]
    fn test_preserves_length_and_rate() {
        let tone = generate_test_tone(440.0, 0.6, 0.3, 22050).unwrap();
        let out = master(&tone, &MasteringParams::professional()).unwrap();
        assert_eq!(out.len(), tone.len());
        assert_eq!(out.sample_rate(), 22050);
    }

    #[test]
    fn test_empty_buffer_pass_through() {
        let empty = SampleBuffer::new(Vec::new(), 44100).unwrap();
        let out = master(&empty, &MasteringParams::professional()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_repeated_processing_is_deterministic() {
        let tone = generate_test_tone(330.0, 0.9, 0.3, 44100).unwrap();
        let mut chain = MasteringChain::build(&MasteringParams::basic(), StageSet::ALL).unwrap();
        let first = chain.process(&tone).unwrap();
        let second = chain.process(&tone).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let params = MasteringParams {
            compressor_ratio: 0.9,
            ..Default::default()
        };
        let err = master(&SampleBuffer::silent(10, 44100).unwrap(), &params).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_validation_accepts_wide_enabled_settings() {
        let params = MasteringParams {
            compressor_threshold_db: -70.0,
            compressor_ratio: 25.0,
            compressor_attack_ms: 150.0,
            limiter_threshold_db: -15.0,
            limiter_release_ms: 2000.0,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validation_skips_disabled_stages() {
        let params = MasteringParams {
            use_compressor: false,
            compressor_attack_ms: -500.0,
            compressor_ratio: 0.1,
            use_limiter: false,
            limiter_threshold_db: 6.0,
            ..Default::default()
        };
        assert!(params.validate().is_ok());

        let enabled = MasteringParams {
            use_compressor: true,
            use_limiter: true,
            ..params
        };
        let err = enabled.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert!(err.to_string().contains("compressor_ratio"));
    }

    #[test]
    fn test_limiter_threshold_above_zero_rejected() {
        let params = MasteringParams {
            limiter_threshold_db: 0.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let params = MasteringParams {
            highpass_hz: Some(-30.0),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_normalize_peak_never_amplifies() {
        let quiet = SampleBuffer::new(vec![0.1, -0.3], 44100).unwrap();
        assert_eq!(normalize_peak(&quiet, SAFETY_PEAK), quiet);

        let silent = SampleBuffer::silent(16, 44100).unwrap();
        assert_eq!(normalize_peak(&silent, SAFETY_PEAK), silent);
    }

    #[test]
    fn test_params_deserialize_with_aliases_and_defaults() {
        let json = r#"{
            "compressor_threshold": -20.0,
            "compressor_attack": 5.0,
            "limiter_threshold": -1.0,
            "gain_db": 2.5
        }"#;
        let params: MasteringParams = serde_json::from_str(json).unwrap();

        assert_eq!(params.compressor_threshold_db, -20.0);
        assert_eq!(params.compressor_attack_ms, 5.0);
        assert_eq!(params.limiter_threshold_db, -1.0);
        assert_eq!(params.gain_db, 2.5);
        // Untouched fields keep their defaults
        assert_eq!(params.compressor_ratio, 1.5);
        assert!(params.use_limiter);
        assert_eq!(params.highpass_hz, None);
    }

    #[test]
    fn test_describe_lists_stages() {
        let chain = MasteringChain::build(&MasteringParams::basic(), StageSet::ALL).unwrap();
        let described = chain.describe();
        assert_eq!(described[1]["type"], "gain");
        assert_eq!(described[1]["params"]["gain_db"], 1.0);
    }
}
