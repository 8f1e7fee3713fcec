//! Limiter Effect
//!
//! Brickwall limiter: peaks never leave the stage above the ceiling, and a
//! configurable release controls how quickly gain recovers afterwards.

use serde_json::{json, Value};

use crate::dsp::effect::Effect;
use crate::engine::{db_to_linear, linear_to_db, SampleBuffer};

// ============================================================================
// Constants
// ============================================================================

/// Maximum ceiling in dB
const MAX_CEILING_DB: f32 = 0.0;

/// Minimum release time in ms
const MIN_RELEASE_MS: f32 = 0.01;

/// Default sample rate
const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Very fast attack time for brickwall limiting (0.1ms)
const ATTACK_MS: f32 = 0.1;

/// Calculate envelope coefficient from time constant
#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_ms * sample_rate / 1000.0)).exp()
}

// ============================================================================
// Limiter Effect
// ============================================================================

/// Brickwall limiter
///
/// # Parameters
/// - `ceiling_db`: Maximum output level, at most 0 dB
/// - `release_ms`: Release time for gain recovery, positive
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling_db: f32,
    release_ms: f32,
    envelope: f32,
    sample_rate: f32,
    ceiling_linear: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Limiter {
    /// Create a new limiter with the given ceiling and release
    pub fn new(ceiling_db: f32, release_ms: f32) -> Self {
        let mut limiter = Self {
            ceiling_db: ceiling_db.min(MAX_CEILING_DB),
            release_ms: release_ms.max(MIN_RELEASE_MS),
            envelope: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            ceiling_linear: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
        };
        limiter.update_coefficients();
        limiter
    }

    /// Get ceiling in dB
    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    /// Get ceiling as linear amplitude
    pub fn ceiling_linear(&self) -> f32 {
        self.ceiling_linear
    }

    /// Get release time in milliseconds
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_to_coeff(ATTACK_MS, self.sample_rate);
        self.release_coeff = time_to_coeff(self.release_ms, self.sample_rate);
        self.ceiling_linear = db_to_linear(self.ceiling_db);
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(-0.5, 100.0)
    }
}

impl Effect for Limiter {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        for sample in buffer.samples_mut() {
            let level = sample.abs();

            let target_reduction_db = if level > self.ceiling_linear {
                (linear_to_db(level) - self.ceiling_db).max(0.0)
            } else {
                0.0
            };

            // Envelope holds gain reduction in dB
            let coeff = if target_reduction_db > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * target_reduction_db;

            *sample *= db_to_linear(-self.envelope);

            // The envelope lags by design; the hard clip makes the ceiling absolute
            if sample.abs() > self.ceiling_linear {
                *sample = sample.signum() * self.ceiling_linear;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "limiter"
    }

    fn get_params(&self) -> Value {
        json!({
            "ceiling_db": self.ceiling_db,
            "release_ms": self.release_ms,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
