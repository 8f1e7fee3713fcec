//! Refmaster - Reference-Matched Audio Mastering
//!
//! Refmaster takes a target track and an optional reference track and
//! produces a mastered version of the target whose level approaches the
//! reference's.
//!
//! # Architecture
//!
//! The pipeline is a chain of pure buffer transforms driven by a session:
//! - Engine: decoding, resampling, WAV export
//! - DSP: RMS level matching and the fixed mastering chain
//!   (highpass → compressor → gain → lowpass → limiter, then a 0.98 safety ceiling)
//! - Render: before/after waveform charts as PNG
//! - Session: guarded state machine and session-namespaced artifact storage

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod render;
pub mod session;

pub use config::MasteringConfig;
pub use dsp::{master, match_level, MasteringParams, Preset, StageSet};
pub use engine::{load_audio, resample, SampleBuffer};
pub use error::{MasteringError, Result};
pub use render::{render, QualityMode};
pub use session::{MasteringSession, SessionReport, SessionState, SessionStorage};
