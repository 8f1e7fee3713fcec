//! Audio Engine Module
//!
//! Buffer type and the I/O side of the pipeline:
//! - Sample buffer and level analysis
//! - Decoding and WAV export
//! - Sample rate conversion

pub mod buffer;
pub mod io;
pub mod resample;

pub use buffer::{db_to_linear, linear_to_db, SampleBuffer, SAFETY_PEAK};
pub use io::{
    generate_test_tone, is_supported_extension, load_audio, write_wav, ExportFormat,
    SUPPORTED_EXTENSIONS,
};
pub use resample::resample;
