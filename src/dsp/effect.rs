//! Effect trait definition
//!
//! Base trait for every mastering chain stage.

use serde_json::Value;

use crate::engine::SampleBuffer;

/// Base trait for chain stages
///
/// Stages process a whole buffer in place. The chain owns a private copy of
/// its input, so in-place processing never leaks across stage boundaries.
pub trait Effect: Send {
    /// Process the buffer in place
    fn process(&mut self, buffer: &mut SampleBuffer);

    /// Prepare the effect for a sample rate
    fn prepare(&mut self, sample_rate: u32);

    /// Clear envelope followers and filter history
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get all parameters as JSON (for logs and session manifests)
    fn get_params(&self) -> Value;
}
