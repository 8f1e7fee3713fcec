//! Waveform Rendering Module
//!
//! Before/after charts for the mastering preview:
//! - Bitmap font and raster primitives
//! - Strided decimation for long buffers
//! - PNG output keyed by session and version

pub mod canvas;
pub mod font;
pub mod waveform;

pub use waveform::{
    decimate, render, QualityMode, WaveformImage, WaveformRenderer, WaveformStyle,
    WaveformVersion,
};
