//! Sample rate conversion
//!
//! Band-limited windowed-sinc resampling using rubato. The whole buffer is
//! pushed through in fixed chunks and the tail is flushed. `SincFixedIn`
//! centres its kernel on the first input frame, so the output already lines
//! up with the input timeline and only the flushed tail is cut.

use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::engine::buffer::SampleBuffer;
use crate::error::{MasteringError, Result};

/// Frames fed to the resampler per call
const CHUNK_SIZE: usize = 1024;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn resample_error(e: impl std::fmt::Display) -> MasteringError {
    MasteringError::Resample {
        reason: e.to_string(),
    }
}

/// Exact `ceil(len * to / from)` in integer arithmetic
fn output_len(len: usize, from: u32, to: u32) -> usize {
    let (len, from, to) = (len as u64, from as u64, to as u64);
    ((len * to + from - 1) / from) as usize
}

/// Resample a buffer to `target_rate`
///
/// Returns an identical copy when the rates already match. The output has
/// `ceil(len * target_rate / source_rate)` samples and the same amplitude
/// scale as the input.
///
/// # Errors
/// * `InvalidSampleRate` - If `target_rate` is zero
/// * `Resample` - If rubato rejects the conversion
pub fn resample(buffer: &SampleBuffer, target_rate: u32) -> Result<SampleBuffer> {
    if target_rate == 0 {
        return Err(MasteringError::InvalidSampleRate { rate: target_rate });
    }

    let source_rate = buffer.sample_rate();
    if source_rate == target_rate {
        return Ok(buffer.clone());
    }

    if buffer.is_empty() {
        return SampleBuffer::new(Vec::new(), target_rate);
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected_len = output_len(buffer.len(), source_rate, target_rate);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, sinc_params(), CHUNK_SIZE, 1)
        .map_err(resample_error)?;

    let mut output: Vec<f32> = Vec::with_capacity(expected_len + resampler.output_frames_max());
    let mut remaining = buffer.samples();

    while remaining.len() >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk: [&[f32]; 1] = [&remaining[..frames]];
        let processed = resampler
            .process(&chunk[..], None)
            .map_err(resample_error)?;
        output.extend_from_slice(&processed[0]);
        remaining = &remaining[frames..];
    }

    if !remaining.is_empty() {
        let chunk: [&[f32]; 1] = [remaining];
        let processed = resampler
            .process_partial(Some(&chunk[..]), None)
            .map_err(resample_error)?;
        output.extend_from_slice(&processed[0]);
    }

    // Flush the filter tail until the output covers the input
    while output.len() < expected_len {
        let processed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(resample_error)?;
        if processed[0].is_empty() {
            break;
        }
        output.extend_from_slice(&processed[0]);
    }

    let mut samples = output;
    samples.resize(expected_len, 0.0);

    debug!(
        source_rate,
        target_rate,
        input_len = buffer.len(),
        output_len = samples.len(),
        "Resampled buffer"
    );

    SampleBuffer::new(samples, target_rate)
}
