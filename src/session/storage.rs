//! Session Artifact Storage
//!
//! Every session writes into one shared directory. File names carry the
//! session id, so concurrent sessions never collide and no locking is
//! needed. Each file is written to a temporary name in the same directory
//! and renamed into place, so readers never observe a partial artifact.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::dsp::{LevelWarning, MasteringParams};
use crate::engine::{write_wav, ExportFormat, SampleBuffer};
use crate::error::{MasteringError, Result};
use crate::render::WaveformVersion;

/// Extension of in-flight temporary files
const TEMP_EXTENSION: &str = "tmp";

/// Kind of persisted artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    MasteredAudio,
    OriginalPreview,
    MasteredPreview,
    OriginalWaveform,
    MasteredWaveform,
}

/// One persisted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Per-session manifest stored as `session_<id>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub persisted_at: DateTime<Utc>,
    pub target: PathBuf,
    pub reference: Option<PathBuf>,
    pub params: MasteringParams,
    pub level_adjustment: Option<f64>,
    pub level_warning: Option<LevelWarning>,
    pub remaster_count: u32,
    pub artifacts: Vec<ArtifactRecord>,
    #[serde(default)]
    pub render_errors: Vec<String>,
}

/// Shared artifact directory
#[derive(Debug, Clone)]
pub struct SessionStorage {
    root: PathBuf,
}

impl SessionStorage {
    /// Open a storage directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Get the storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<stem>_MASTERED_<id>.wav`
    pub fn mastered_audio_path(&self, stem: &str, session_id: Uuid) -> PathBuf {
        self.root
            .join(format!("{}_MASTERED_{}.wav", sanitize_stem(stem), session_id))
    }

    /// `original_preview_<id>.wav` or `mastered_preview_<id>.wav`
    pub fn preview_path(&self, version: WaveformVersion, session_id: Uuid) -> PathBuf {
        self.root
            .join(format!("{}_preview_{}.wav", version.as_str(), session_id))
    }

    /// `waveform_original_<id>.png` or `waveform_mastered_<id>.png`
    pub fn waveform_path(&self, version: WaveformVersion, session_id: Uuid) -> PathBuf {
        self.root
            .join(format!("waveform_{}_{}.png", version.as_str(), session_id))
    }

    /// `session_<id>.json`
    pub fn manifest_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!("session_{}.json", session_id))
    }

    /// Write a WAV artifact atomically
    pub fn write_audio(
        &self,
        kind: ArtifactKind,
        path: &Path,
        buffer: &SampleBuffer,
        format: ExportFormat,
    ) -> Result<ArtifactRecord> {
        let temp = temp_path(path);
        if let Err(e) = write_wav(buffer, &temp, format) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        commit(&temp, path)?;

        let record = ArtifactRecord {
            kind,
            file_name: file_name(path),
            size_bytes: fs::metadata(path)?.len(),
            sha256: calculate_checksum(path)?,
        };
        debug!(file = %record.file_name, bytes = record.size_bytes, "Audio artifact written");
        Ok(record)
    }

    /// Write a binary artifact atomically
    pub fn write_bytes(
        &self,
        kind: ArtifactKind,
        path: &Path,
        bytes: &[u8],
    ) -> Result<ArtifactRecord> {
        write_atomic(path, bytes)?;

        let record = ArtifactRecord {
            kind,
            file_name: file_name(path),
            size_bytes: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
        };
        debug!(file = %record.file_name, bytes = record.size_bytes, "Artifact written");
        Ok(record)
    }

    /// Remove an artifact left over from an earlier pass, if present
    pub fn remove_artifact(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save a session manifest
    pub fn save_manifest(&self, manifest: &SessionManifest) -> Result<PathBuf> {
        let path = self.manifest_path(manifest.session_id);
        let content = serde_json::to_string_pretty(manifest)?;
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Load a session manifest
    pub fn load_manifest(&self, session_id: Uuid) -> Result<SessionManifest> {
        let content = fs::read_to_string(self.manifest_path(session_id))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Verify every artifact in a manifest still matches its checksum
    pub fn verify(&self, manifest: &SessionManifest) -> Result<bool> {
        for artifact in &manifest.artifacts {
            let path = self.root.join(&artifact.file_name);
            if !path.exists() || calculate_checksum(&path)? != artifact.sha256 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// List every file belonging to a session, sorted by name
    ///
    /// Temporary files from in-flight writes are skipped.
    pub fn list_artifacts(&self, session_id: Uuid) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let id = session_id.to_string();
        let mut artifacts: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                name.contains(&id) && !name.ends_with(TEMP_EXTENSION)
            })
            .map(|entry| entry.path().to_path_buf())
            .collect();

        artifacts.sort();
        Ok(artifacts)
    }
}

/// Keep a file stem safe to embed in an artifact name
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "audio".to_string()
    } else {
        cleaned
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Hidden sibling of `path` unique to this write
fn temp_path(path: &Path) -> PathBuf {
    let name = format!(".{}.{}.{}", file_name(path), Uuid::new_v4().simple(), TEMP_EXTENSION);
    path.with_file_name(name)
}

fn commit(temp: &Path, path: &Path) -> Result<()> {
    fs::rename(temp, path).map_err(|e| {
        let _ = fs::remove_file(temp);
        MasteringError::Export {
            path: path.to_path_buf(),
            reason: format!("could not move artifact into place: {}", e),
        }
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_path(path);
    let written = fs::File::create(&temp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(MasteringError::Export {
            path: path.to_path_buf(),
            reason: e.to_string(),
        });
    }
    commit(&temp, path)
}

/// SHA-256 of a file, streamed
fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use tempfile::TempDir;

    fn storage() -> (TempDir, SessionStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::open(dir.path().join("uploads")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_artifact_names() {
        let (_dir, storage) = storage();
        let id = Uuid::nil();

        let name = |p: PathBuf| p.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(
            name(storage.mastered_audio_path("my song", id)),
            format!("my_song_MASTERED_{}.wav", id)
        );
        assert_eq!(
            name(storage.preview_path(WaveformVersion::Original, id)),
            format!("original_preview_{}.wav", id)
        );
        assert_eq!(
            name(storage.waveform_path(WaveformVersion::Mastered, id)),
            format!("waveform_mastered_{}.png", id)
        );
        assert_eq!(name(storage.manifest_path(id)), format!("session_{}.json", id));
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("track-01_final"), "track-01_final");
        assert_eq!(sanitize_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_stem(""), "audio");
    }

    #[test]
    fn test_write_bytes_records_checksum() {
        let (_dir, storage) = storage();
        let path = storage.waveform_path(WaveformVersion::Original, Uuid::nil());

        let record = storage
            .write_bytes(ArtifactKind::OriginalWaveform, &path, b"abc")
            .unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"abc");
        assert_eq!(record.size_bytes, 3);
        assert_eq!(
            record.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_write_audio_leaves_no_temp_files() {
        let (_dir, storage) = storage();
        let id = Uuid::new_v4();
        let tone = generate_test_tone(440.0, 0.5, 0.1, 44100).unwrap();
        let path = storage.preview_path(WaveformVersion::Mastered, id);

        let record = storage
            .write_audio(ArtifactKind::MasteredPreview, &path, &tone, ExportFormat::default())
            .unwrap();

        assert!(path.exists());
        assert_eq!(record.size_bytes, fs::metadata(&path).unwrap().len());
        let leftovers = fs::read_dir(storage.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_EXTENSION))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_list_artifacts_is_namespaced() {
        let (_dir, storage) = storage();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        for id in [a, b] {
            let path = storage.waveform_path(WaveformVersion::Original, id);
            storage.write_bytes(ArtifactKind::OriginalWaveform, &path, b"png").unwrap();
        }

        let listed = storage.list_artifacts(a).unwrap();
        assert_eq!(listed, vec![storage.waveform_path(WaveformVersion::Original, a)]);
    }

    #[test]
    fn test_manifest_round_trip_and_verify() {
        let (_dir, storage) = storage();
        let id = Uuid::new_v4();
        let path = storage.waveform_path(WaveformVersion::Mastered, id);
        let record = storage
            .write_bytes(ArtifactKind::MasteredWaveform, &path, b"png-bytes")
            .unwrap();

        let manifest = SessionManifest {
            session_id: id,
            created_at: Utc::now(),
            persisted_at: Utc::now(),
            target: PathBuf::from("target.wav"),
            reference: None,
            params: MasteringParams::basic(),
            level_adjustment: None,
            level_warning: Some(LevelWarning::NoReference),
            remaster_count: 0,
            artifacts: vec![record],
            render_errors: Vec::new(),
        };
        storage.save_manifest(&manifest).unwrap();

        let loaded = storage.load_manifest(id).unwrap();
        assert_eq!(loaded, manifest);
        assert!(storage.verify(&loaded).unwrap());

        fs::write(&path, b"tampered").unwrap();
        assert!(!storage.verify(&loaded).unwrap());
    }

    #[test]
    fn test_remove_missing_artifact_is_ok() {
        let (_dir, storage) = storage();
        let path = storage.waveform_path(WaveformVersion::Mastered, Uuid::nil());
        assert!(storage.remove_artifact(&path).is_ok());
    }
}
