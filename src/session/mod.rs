//! Session Module
//!
//! Per-request orchestration and the artifacts it leaves behind:
//! - Guarded state machine with re-entry at the mastering step
//! - Shared, session-namespaced artifact storage
//! - The session driver itself

pub mod mastering;
pub mod state;
pub mod storage;

pub use mastering::{LevelSummary, MasteringSession, RenderFailure, SessionReport};
pub use state::SessionState;
pub use storage::{ArtifactKind, ArtifactRecord, SessionManifest, SessionStorage};
