//! Session state machine
//!
//! Linear progression from `Created` to `Persisted`. The single back-edge
//! re-enters `Mastered` so a session can be re-mastered with new params
//! without reloading or re-leveling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MasteringError, Result};

/// Where a mastering session is in its pipeline
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Created,
    Loaded,
    LevelMatched,
    RenderedOriginal,
    Mastered,
    RenderedMastered,
    Persisted,
}

impl SessionState {
    /// Next state on the forward path, `None` once persisted
    pub fn next(self) -> Option<SessionState> {
        match self {
            SessionState::Created => Some(SessionState::Loaded),
            SessionState::Loaded => Some(SessionState::LevelMatched),
            SessionState::LevelMatched => Some(SessionState::RenderedOriginal),
            SessionState::RenderedOriginal => Some(SessionState::Mastered),
            SessionState::Mastered => Some(SessionState::RenderedMastered),
            SessionState::RenderedMastered => Some(SessionState::Persisted),
            SessionState::Persisted => None,
        }
    }

    /// Check if `to` is reachable in one step
    ///
    /// Forward steps are always allowed. `Mastered` may also be re-entered
    /// from `Mastered`, `RenderedMastered` or `Persisted`.
    pub fn can_transition_to(self, to: SessionState) -> bool {
        self.next() == Some(to) || (to == SessionState::Mastered && self.can_remaster())
    }

    /// Check if the session holds a leveled target and may be re-mastered
    pub fn can_remaster(self) -> bool {
        matches!(
            self,
            SessionState::Mastered | SessionState::RenderedMastered | SessionState::Persisted
        )
    }

    /// Guarded transition
    ///
    /// # Errors
    /// * `InvalidTransition` - If `to` is not reachable from the current state
    pub fn advance_to(&mut self, to: SessionState) -> Result<()> {
        if !self.can_transition_to(to) {
            return Err(MasteringError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        *self = to;
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Loaded => "loaded",
            SessionState::LevelMatched => "level_matched",
            SessionState::RenderedOriginal => "rendered_original",
            SessionState::Mastered => "mastered",
            SessionState::RenderedMastered => "rendered_mastered",
            SessionState::Persisted => "persisted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
