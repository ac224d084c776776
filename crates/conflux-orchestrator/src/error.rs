use conflux_merge::MergeError;
use conflux_sync::SyncError;
use conflux_types::{Phase, TypeError};
use thiserror::Error;

use crate::session::MergeSession;

/// A merge attempt that could not complete.
///
/// Both session variants are raised only after emergency recovery has
/// run, and carry the archived session record so callers can see which
/// phase failed and which nodes were recovered.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("merge failed during {phase}: {reason}")]
    Failed {
        phase: Phase,
        reason: String,
        session: Box<MergeSession>,
    },

    #[error("merge timed out after {timeout_ms} ms during {phase}")]
    Timeout {
        phase: Phase,
        timeout_ms: u64,
        session: Box<MergeSession>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// The failed session record, if this error came from a merge attempt.
    pub fn session(&self) -> Option<&MergeSession> {
        match self {
            Self::Failed { session, .. } | Self::Timeout { session, .. } => Some(&**session),
            Self::Config(_) => None,
        }
    }

    /// The phase the session was in when it failed.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Failed { phase, .. } | Self::Timeout { phase, .. } => Some(*phase),
            Self::Config(_) => None,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Anything that aborts a pipeline phase.
#[derive(Debug, Error)]
pub(crate) enum StageError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Phase(#[from] TypeError),
}
