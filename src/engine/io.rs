//! Audio file I/O for Refmaster
//!
//! Decoding goes through symphonia so WAV, MP3 and FLAC uploads share one
//! path. Every file is downmixed to mono at its native sample rate; no
//! resampling happens at load time. Export writes mono WAV with hound.

use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer as DecodedSamples;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::engine::buffer::SampleBuffer;
use crate::error::{MasteringError, Result};

/// Upload extensions accepted by the front end
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24 (integer) or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 16 }
    }
}

impl ExportFormat {
    /// Create a new export format with the given bit depth
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }

    /// Check the bit depth is one we can write
    pub fn validate(&self) -> Result<()> {
        match self.bit_depth {
            16 | 24 | 32 => Ok(()),
            other => Err(MasteringError::InvalidParameter {
                param: "bit_depth".to_string(),
                value: other.to_string(),
                expected: "16, 24 or 32".to_string(),
            }),
        }
    }
}

/// Check whether a path has an upload extension the front end accepts
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Decode an audio file into a mono buffer at its native sample rate
///
/// Multi-channel audio is downmixed by averaging the channels.
///
/// # Errors
/// * `Decode` - If the file is missing, cannot be probed, has no audio
///   track, or a fatal decoder error occurs
pub fn load_audio(path: &Path) -> Result<SampleBuffer> {
    let decode_error = |reason: String| MasteringError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        return Err(decode_error("file not found".to_string()));
    }

    let file = File::open(path).map_err(|e| decode_error(format!("cannot open file: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(format!("unsupported or corrupt file: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| decode_error("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| decode_error("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(format!("unsupported codec: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(format!("failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!(path = %path.display(), reason, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(decode_error(format!("decoder failed: {}", e))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut interleaved = DecodedSamples::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);

        mono.extend(
            interleaved
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    debug!(
        path = %path.display(),
        sample_rate,
        num_samples = mono.len(),
        "Decoded audio file"
    );

    SampleBuffer::new(mono, sample_rate)
}

/// Write a buffer to a mono WAV file at the buffer's sample rate
///
/// # Errors
/// * `InvalidParameter` - If the bit depth is not 16, 24 or 32
/// * `Export` - If the file cannot be created or written
pub fn write_wav(buffer: &SampleBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    format.validate()?;

    let export_error = |e: hound::Error| MasteringError::Export {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(export_error)?;

    match format.bit_depth {
        16 => {
            for &sample in buffer.samples() {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(export_error)?;
            }
        }
        24 => {
            for &sample in buffer.samples() {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(export_error)?;
            }
        }
        _ => {
            for &sample in buffer.samples() {
                writer.write_sample(sample).map_err(export_error)?;
            }
        }
    }

    writer.finalize().map_err(export_error)?;

    Ok(())
}

/// Generate a mono sine test tone
///
/// # Errors
/// * `InvalidSampleRate` - If `sample_rate` is zero
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> Result<SampleBuffer> {
    if sample_rate == 0 {
        return Err(MasteringError::InvalidSampleRate { rate: sample_rate });
    }

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();

    SampleBuffer::new(samples, sample_rate)
}

// ============================================================================
// Tests
// ============================================================================
