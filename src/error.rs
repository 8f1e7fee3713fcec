//! Error handling for Refmaster
//!
//! Every core operation returns [`Result`]. Errors carry a stable code and
//! recovery suggestions so the calling layer can build user-facing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Refmaster operations
pub type Result<T> = std::result::Result<T, MasteringError>;

/// Main error type for Refmaster operations
#[derive(Error, Debug)]
pub enum MasteringError {
    // Input Errors
    #[error("Failed to decode audio file {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Invalid sample rate: {rate} Hz")]
    InvalidSampleRate { rate: u32 },

    #[error("Invalid parameter {param} = {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Processing Errors
    #[error("Resampling failed: {reason}")]
    Resample { reason: String },

    #[error("DSP overflow: stage '{stage}' produced invalid audio (NaN/Inf)")]
    DspOverflow { stage: String },

    #[error("Waveform render failed: {reason}")]
    Render { reason: String },

    // Session Errors
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session has no {stage} output yet")]
    MissingInput { stage: String },

    // Output Errors
    #[error("Failed to write audio file {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MasteringError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MasteringError::Decode { .. } => "DECODE_ERROR",
            MasteringError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            MasteringError::InvalidParameter { .. } => "INVALID_PARAMETER",
            MasteringError::Resample { .. } => "RESAMPLE_ERROR",
            MasteringError::DspOverflow { .. } => "DSP_OVERFLOW",
            MasteringError::Render { .. } => "RENDER_ERROR",
            MasteringError::InvalidTransition { .. } => "INVALID_TRANSITION",
            MasteringError::MissingInput { .. } => "MISSING_INPUT",
            MasteringError::Export { .. } => "EXPORT_ERROR",
            MasteringError::Io(_) => "IO_ERROR",
            MasteringError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can recover by changing its input
    ///
    /// The core never retries on its own; recoverable errors are the ones a
    /// re-upload or a parameter change can fix.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MasteringError::Decode { .. }
                | MasteringError::InvalidParameter { .. }
                | MasteringError::DspOverflow { .. }
                | MasteringError::Render { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MasteringError::Decode { .. } => vec![
                "Check the file was uploaded completely",
                "Convert the file to WAV or MP3 and upload it again",
            ],
            MasteringError::InvalidParameter { .. } => vec![
                "Compressor ratio must be at least 1.0",
                "Thresholds are expressed in dBFS and must be 0 or below",
                "Gain must stay between -96 and +24 dB",
            ],
            MasteringError::DspOverflow { .. } => vec![
                "The mastering settings may be too extreme",
                "Try a gentler preset",
            ],
            MasteringError::Render { .. } => vec![
                "Audio output was kept; only the waveform preview is missing",
                "Try the fast quality mode",
            ],
            MasteringError::Export { .. } | MasteringError::Io(_) => vec![
                "Check free disk space in the storage directory",
                "Check write permissions on the storage directory",
            ],
            _ => vec![],
        }
    }
}
