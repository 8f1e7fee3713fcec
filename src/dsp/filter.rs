//! Pass filters for the professional chain
//!
//! Second-order Butterworth high-pass and low-pass biquads
//! (Audio EQ Cookbook formulas, Direct Form I).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::dsp::effect::Effect;
use crate::engine::SampleBuffer;

/// Butterworth Q
const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Filter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Remove below the cut-off
    HighPass,
    /// Remove above the cut-off
    LowPass,
}

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, Default)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    fn calculate(kind: FilterKind, sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2) = match kind {
            FilterKind::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
            ),
            FilterKind::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
            ),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Filter history
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2
            - c.a1 * self.y1
            - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// High-pass or low-pass filter stage
#[derive(Debug, Clone)]
pub struct PassFilter {
    kind: FilterKind,
    cutoff_hz: f32,
    coeffs: BiquadCoeffs,
    state: BiquadState,
    /// Set when the cut-off is unusable at the prepared sample rate
    bypassed: bool,
}

impl PassFilter {
    /// Create a filter of the given kind
    pub fn new(kind: FilterKind, cutoff_hz: f32) -> Self {
        let mut filter = Self {
            kind,
            cutoff_hz,
            coeffs: BiquadCoeffs::default(),
            state: BiquadState::default(),
            bypassed: false,
        };
        filter.prepare(44100);
        filter
    }

    /// Create a high-pass filter
    pub fn high_pass(cutoff_hz: f32) -> Self {
        Self::new(FilterKind::HighPass, cutoff_hz)
    }

    /// Create a low-pass filter
    pub fn low_pass(cutoff_hz: f32) -> Self {
        Self::new(FilterKind::LowPass, cutoff_hz)
    }

    /// Get the filter kind
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Get the cut-off frequency
    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    /// Check if the filter passes audio through untouched
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

impl Effect for PassFilter {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if self.bypassed {
            return;
        }

        for sample in buffer.samples_mut() {
            *sample = self.state.process(*sample as f64, &self.coeffs) as f32;
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        let nyquist = sample_rate as f64 / 2.0;
        let cutoff = self.cutoff_hz as f64;

        // A cut-off at or past Nyquist cannot be realised
        self.bypassed = !(cutoff > 0.0 && cutoff < nyquist);
        if self.bypassed {
            debug!(
                kind = ?self.kind,
                cutoff_hz = self.cutoff_hz,
                sample_rate,
                "Filter cut-off outside the usable band, bypassing"
            );
            return;
        }

        self.coeffs = BiquadCoeffs::calculate(self.kind, sample_rate as f64, cutoff, BUTTERWORTH_Q);
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    fn effect_type(&self) -> &'static str {
        match self.kind {
            FilterKind::HighPass => "highpass",
            FilterKind::LowPass => "lowpass",
        }
    }

    fn get_params(&self) -> Value {
        json!({
            "cutoff_hz": self.cutoff_hz,
            "bypassed": self.bypassed,
        })
    }
}
