//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::info;

use crate::config::MasteringConfig;
use crate::dsp::{MasteringParams, Preset};
use crate::engine::{is_supported_extension, load_audio};
use crate::error::{MasteringError, Result};
use crate::render::{QualityMode, WaveformRenderer};
use crate::session::{MasteringSession, SessionStorage};

/// Options for the `master` command
#[derive(Debug, Default)]
pub struct MasterOptions {
    pub reference: Option<PathBuf>,
    pub preset: Option<Preset>,
    pub params: Option<String>,
    pub quality: Option<QualityMode>,
    pub config: Option<PathBuf>,
    pub storage: Option<PathBuf>,
}

/// Reject uploads outside the accepted formats before any decoding
fn check_upload(param: &str, path: &Path) -> Result<()> {
    if is_supported_extension(path) {
        return Ok(());
    }
    Err(MasteringError::InvalidParameter {
        param: param.to_string(),
        value: path.display().to_string(),
        expected: "a .wav or .mp3 file".to_string(),
    })
}

/// Run a full mastering session and print its report.
pub fn master(target: &Path, options: MasterOptions) -> Result<()> {
    check_upload("target", target)?;
    if let Some(reference) = &options.reference {
        check_upload("reference", reference)?;
    }

    let mut config = match &options.config {
        Some(path) => MasteringConfig::load(path)?,
        None => MasteringConfig::default(),
    };
    if let Some(preset) = options.preset {
        config.preset = preset;
    }
    if let Some(quality) = options.quality {
        config.quality = quality;
    }
    if let Some(storage) = options.storage {
        config.storage_dir = storage;
    }
    config.validate()?;

    let params = match &options.params {
        Some(raw) => serde_json::from_str::<MasteringParams>(raw)?,
        None => config.params(),
    };

    info!(
        target = %target.display(),
        preset = ?config.preset,
        storage = %config.storage_dir.display(),
        "Mastering"
    );

    let storage = SessionStorage::open(&config.storage_dir)?;
    let mut session =
        MasteringSession::new(target, options.reference, config).with_params(params)?;
    let report = session.run(&storage)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Render a waveform image for one file.
pub fn render(input: &Path, output: &Path, title: &str, quality: QualityMode) -> Result<()> {
    info!("Rendering waveform: {}", input.display());

    let buffer = load_audio(input)?;
    let png = WaveformRenderer::default().render_quality(&buffer, title, quality)?;
    fs::write(output, &png)?;

    println!("Waveform written: {} ({} bytes)", output.display(), png.len());

    Ok(())
}

/// Print basic levels for one file.
pub fn analyze(input: &Path) -> Result<()> {
    info!("Analyzing: {}", input.display());

    let buffer = load_audio(input)?;
    let summary = json!({
        "path": input.display().to_string(),
        "sample_rate": buffer.sample_rate(),
        "samples": buffer.len(),
        "duration_secs": buffer.duration_secs(),
        "rms": buffer.rms(),
        "rms_db": buffer.rms_db(),
        "peak": buffer.peak(),
        "peak_db": buffer.peak_db(),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
