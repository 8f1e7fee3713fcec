//! DSP Module
//!
//! Mastering stages and the processing built from them.
//! All chain stages implement the `Effect` trait for uniform processing.
//! Stage order is fixed: highpass → compressor → gain → lowpass → limiter.

pub mod chain;
pub mod compressor;
pub mod effect;
pub mod filter;
pub mod gain;
pub mod level;
pub mod limiter;

pub use chain::{
    master, master_with, normalize_peak, MasteringChain, MasteringParams, Preset, StageSet,
};
pub use compressor::{Compressor, CompressorParams};
pub use effect::Effect;
pub use filter::{FilterKind, PassFilter};
pub use gain::Gain;
pub use level::{match_level, LevelMatch, LevelMatcher, LevelWarning, DEFAULT_HEADROOM};
pub use limiter::Limiter;
