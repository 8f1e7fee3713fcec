//! Mastering Session
//!
//! Drives one request through the pipeline:
//! load → level match → render original → master → render mastered → persist
//!
//! Every step checks the state machine before doing any work and advances
//! it only on success, so a failed step leaves earlier outputs untouched.
//! Waveform failures are the exception: they are recorded on the session
//! and the pipeline carries on to persist the audio.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Span};
use uuid::Uuid;

use crate::config::MasteringConfig;
use crate::dsp::{master_with, LevelMatch, LevelWarning, MasteringParams};
use crate::engine::{load_audio, SampleBuffer};
use crate::error::{MasteringError, Result};
use crate::render::{
    QualityMode, WaveformImage, WaveformRenderer, WaveformStyle, WaveformVersion,
};
use crate::session::state::SessionState;
use crate::session::storage::{ArtifactKind, ArtifactRecord, SessionManifest, SessionStorage};

/// Chart titles
const ORIGINAL_TITLE: &str = "Original Waveform";
const MASTERED_TITLE: &str = "Mastered Waveform";

/// A waveform that could not be rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFailure {
    pub version: WaveformVersion,
    pub message: String,
}

/// Level matching summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    pub target_rms: f64,
    pub reference_rms: f64,
    pub adjustment: Option<f64>,
    pub warning: Option<LevelWarning>,
}

/// Serializable outcome of a session, for the calling layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub target: PathBuf,
    pub reference: Option<PathBuf>,
    pub sample_rate: Option<u32>,
    pub duration_secs: Option<f64>,
    pub params: MasteringParams,
    pub level: Option<LevelSummary>,
    pub mastered_peak: Option<f32>,
    pub mastered_rms_db: Option<f32>,
    pub remaster_count: u32,
    pub artifacts: Vec<ArtifactRecord>,
    pub render_errors: Vec<RenderFailure>,
}

/// One mastering request
pub struct MasteringSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    target_path: PathBuf,
    reference_path: Option<PathBuf>,
    config: MasteringConfig,
    params: MasteringParams,
    style: WaveformStyle,
    state: SessionState,
    span: Span,

    target: Option<SampleBuffer>,
    reference: Option<SampleBuffer>,
    level: Option<LevelMatch>,
    mastered: Option<SampleBuffer>,
    original_waveform: Option<WaveformImage>,
    mastered_waveform: Option<WaveformImage>,
    render_errors: Vec<RenderFailure>,
    artifacts: Vec<ArtifactRecord>,
    remaster_count: u32,
}

impl MasteringSession {
    /// Create a session using the configured preset
    pub fn new(
        target: impl Into<PathBuf>,
        reference: Option<PathBuf>,
        config: MasteringConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            created_at: Utc::now(),
            target_path: target.into(),
            reference_path: reference,
            params: config.params(),
            config,
            style: WaveformStyle::default(),
            state: SessionState::Created,
            span: info_span!("session", session_id = %id),
            target: None,
            reference: None,
            level: None,
            mastered: None,
            original_waveform: None,
            mastered_waveform: None,
            render_errors: Vec::new(),
            artifacts: Vec::new(),
            remaster_count: 0,
        }
    }

    /// Replace the preset params before the first mastering pass
    pub fn with_params(mut self, params: MasteringParams) -> Result<Self> {
        params.validate()?;
        self.params = params;
        Ok(self)
    }

    /// Chart style for both waveforms
    ///
    /// The style is checked when a chart is drawn; a bad style is recorded
    /// as a render failure like any other.
    pub fn with_style(mut self, style: WaveformStyle) -> Self {
        self.style = style;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &MasteringParams {
        &self.params
    }

    pub fn config(&self) -> &MasteringConfig {
        &self.config
    }

    /// Target path given at creation
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Decoded target at its native rate
    pub fn target(&self) -> Option<&SampleBuffer> {
        self.target.as_ref()
    }

    /// Decoded reference at its native rate
    pub fn reference(&self) -> Option<&SampleBuffer> {
        self.reference.as_ref()
    }

    pub fn level_match(&self) -> Option<&LevelMatch> {
        self.level.as_ref()
    }

    /// Level-matched target, the input to every mastering pass
    pub fn leveled(&self) -> Option<&SampleBuffer> {
        self.level.as_ref().map(|l| &l.buffer)
    }

    pub fn mastered(&self) -> Option<&SampleBuffer> {
        self.mastered.as_ref()
    }

    pub fn original_waveform(&self) -> Option<&WaveformImage> {
        self.original_waveform.as_ref()
    }

    pub fn mastered_waveform(&self) -> Option<&WaveformImage> {
        self.mastered_waveform.as_ref()
    }

    pub fn render_errors(&self) -> &[RenderFailure] {
        &self.render_errors
    }

    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    // ========================================================================
    // Pipeline steps
    // ========================================================================

    /// Decode the target and, if given, the reference
    pub fn load(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ensure_transition(SessionState::Loaded)?;

        let target = load_audio(&self.target_path)?;
        let reference = match &self.reference_path {
            Some(path) => Some(load_audio(path)?),
            None => None,
        };

        info!(
            target_rate = target.sample_rate(),
            target_secs = target.duration_secs(),
            reference_rate = reference.as_ref().map(|r| r.sample_rate()),
            "Audio loaded"
        );

        self.target = Some(target);
        self.reference = reference;
        self.state.advance_to(SessionState::Loaded)
    }

    /// Level the target against the reference
    ///
    /// Without a reference the target passes through unchanged with a
    /// [`LevelWarning::NoReference`] warning.
    pub fn match_level(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ensure_transition(SessionState::LevelMatched)?;

        let target = self.target.as_ref().ok_or_else(|| missing("loaded target"))?;
        let level = match &self.reference {
            Some(reference) => self.config.level_matcher()?.match_level(target, reference)?,
            None => LevelMatch::unmatched(target),
        };

        info!(
            target_rms = level.target_rms,
            reference_rms = level.reference_rms,
            adjustment = ?level.adjustment,
            warning = ?level.warning,
            "Level matching complete"
        );

        self.level = Some(level);
        self.state.advance_to(SessionState::LevelMatched)
    }

    /// Render the leveled target's waveform
    pub fn render_original(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ensure_transition(SessionState::RenderedOriginal)?;

        let leveled = self.leveled().ok_or_else(|| missing("level-matched target"))?;
        let result = self.render(leveled, ORIGINAL_TITLE, WaveformVersion::Original);
        self.original_waveform = self.record_render(WaveformVersion::Original, result);

        self.state.advance_to(SessionState::RenderedOriginal)
    }

    /// Run the mastering chain with the session's params
    pub fn master(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        let params = self.params.clone();
        self.apply_chain(params)
    }

    /// Render the mastered waveform
    pub fn render_mastered(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ensure_transition(SessionState::RenderedMastered)?;

        let mastered = self.mastered.as_ref().ok_or_else(|| missing("mastered audio"))?;
        let result = self.render(mastered, MASTERED_TITLE, WaveformVersion::Mastered);
        self.mastered_waveform = self.record_render(WaveformVersion::Mastered, result);

        self.state.advance_to(SessionState::RenderedMastered)
    }

    /// Write audio, waveforms and the manifest to storage
    ///
    /// Audio is written even when a waveform is missing. A stale waveform
    /// from an earlier pass is removed rather than left next to new audio.
    pub fn persist(&mut self, storage: &SessionStorage) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ensure_transition(SessionState::Persisted)?;

        let leveled = self.leveled().ok_or_else(|| missing("level-matched target"))?;
        let mastered = self.mastered.as_ref().ok_or_else(|| missing("mastered audio"))?;
        let format = self.config.export_format();
        let mut artifacts = Vec::with_capacity(5);

        let stem = self
            .target_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        artifacts.push(storage.write_audio(
            ArtifactKind::MasteredAudio,
            &storage.mastered_audio_path(&stem, self.id),
            mastered,
            format,
        )?);
        artifacts.push(storage.write_audio(
            ArtifactKind::OriginalPreview,
            &storage.preview_path(WaveformVersion::Original, self.id),
            leveled,
            format,
        )?);
        artifacts.push(storage.write_audio(
            ArtifactKind::MasteredPreview,
            &storage.preview_path(WaveformVersion::Mastered, self.id),
            mastered,
            format,
        )?);

        for (image, kind) in [
            (&self.original_waveform, ArtifactKind::OriginalWaveform),
            (&self.mastered_waveform, ArtifactKind::MasteredWaveform),
        ] {
            let version = match kind {
                ArtifactKind::OriginalWaveform => WaveformVersion::Original,
                _ => WaveformVersion::Mastered,
            };
            let path = storage.waveform_path(version, self.id);
            match image {
                Some(image) => artifacts.push(storage.write_bytes(kind, &path, &image.png)?),
                None => storage.remove_artifact(&path)?,
            }
        }

        let manifest = SessionManifest {
            session_id: self.id,
            created_at: self.created_at,
            persisted_at: Utc::now(),
            target: self.target_path.clone(),
            reference: self.reference_path.clone(),
            params: self.params.clone(),
            level_adjustment: self.level.as_ref().and_then(|l| l.adjustment),
            level_warning: self.level.as_ref().and_then(|l| l.warning),
            remaster_count: self.remaster_count,
            artifacts: artifacts.clone(),
            render_errors: self.render_errors.iter().map(|f| f.message.clone()).collect(),
        };
        let manifest_path = storage.save_manifest(&manifest)?;

        info!(
            artifacts = artifacts.len(),
            manifest = %manifest_path.display(),
            "Session persisted"
        );

        self.artifacts = artifacts;
        self.state.advance_to(SessionState::Persisted)
    }

    /// Run every step from load to persist
    pub fn run(&mut self, storage: &SessionStorage) -> Result<SessionReport> {
        self.load()?;
        self.match_level()?;
        self.render_original()?;
        self.master()?;
        self.render_mastered()?;
        self.persist(storage)?;
        Ok(self.report())
    }

    /// Re-run the chain with new params, then re-render and re-persist
    ///
    /// Reuses the leveled target; nothing is reloaded. Only valid once the
    /// session has been mastered at least once.
    pub fn remaster(
        &mut self,
        params: MasteringParams,
        storage: &SessionStorage,
    ) -> Result<SessionReport> {
        {
            let span = self.span.clone();
            let _enter = span.enter();
            if !self.state.can_remaster() {
                return Err(MasteringError::InvalidTransition {
                    from: self.state.to_string(),
                    to: SessionState::Mastered.to_string(),
                });
            }
            self.apply_chain(params)?;
            self.remaster_count += 1;
            info!(remaster_count = self.remaster_count, "Session re-mastered");
        }

        self.render_mastered()?;
        self.persist(storage)?;
        Ok(self.report())
    }

    /// Snapshot of the session for the calling layer
    pub fn report(&self) -> SessionReport {
        SessionReport {
            session_id: self.id,
            state: self.state,
            created_at: self.created_at,
            target: self.target_path.clone(),
            reference: self.reference_path.clone(),
            sample_rate: self.leveled().map(|b| b.sample_rate()),
            duration_secs: self.leveled().map(|b| b.duration_secs()),
            params: self.params.clone(),
            level: self.level.as_ref().map(|l| LevelSummary {
                target_rms: l.target_rms,
                reference_rms: l.reference_rms,
                adjustment: l.adjustment,
                warning: l.warning,
            }),
            mastered_peak: self.mastered.as_ref().map(|b| b.peak()),
            mastered_rms_db: self.mastered.as_ref().map(|b| b.rms_db()),
            remaster_count: self.remaster_count,
            artifacts: self.artifacts.clone(),
            render_errors: self.render_errors.clone(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_transition(&self, to: SessionState) -> Result<()> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(MasteringError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Master the leveled target; params are only adopted on success
    fn apply_chain(&mut self, params: MasteringParams) -> Result<()> {
        self.ensure_transition(SessionState::Mastered)?;

        let leveled = self.leveled().ok_or_else(|| missing("level-matched target"))?;
        let mastered = master_with(leveled, &params, self.config.stages)?;

        info!(
            peak = mastered.peak(),
            rms_db = mastered.rms_db(),
            "Mastering complete"
        );

        self.params = params;
        self.mastered = Some(mastered);
        self.mastered_waveform = None;
        self.render_errors.retain(|f| f.version != WaveformVersion::Mastered);
        self.state.advance_to(SessionState::Mastered)
    }

    fn render(
        &self,
        buffer: &SampleBuffer,
        title: &str,
        version: WaveformVersion,
    ) -> Result<WaveformImage> {
        let renderer = WaveformRenderer::new(self.style.clone())?;
        let png = renderer.render_quality(buffer, title, self.quality())?;
        Ok(WaveformImage {
            session_id: self.id,
            version,
            png,
        })
    }

    fn record_render(
        &mut self,
        version: WaveformVersion,
        result: Result<WaveformImage>,
    ) -> Option<WaveformImage> {
        match result {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(%version, error = %e, "Waveform render failed, continuing without it");
                self.render_errors.push(RenderFailure {
                    version,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn quality(&self) -> QualityMode {
        self.config.quality
    }
}

fn missing(stage: &str) -> MasteringError {
    MasteringError::MissingInput {
        stage: stage.to_string(),
    }
}
