use std::fmt;

use serde::{Deserialize, Serialize};

/// Merge session state machine.
///
/// ```text
/// initializing -> sync_checkpoint -> capturing -> resolving -> unifying -> resuming -> completed
///       \______________ any non-terminal phase ______________/
///                              |
///                           failed -> emergency_recovery
/// ```
///
/// No phase is ever re-entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initializing,
    SyncCheckpoint,
    Capturing,
    Resolving,
    Unifying,
    Resuming,
    Completed,
    Failed,
    EmergencyRecovery,
}

impl Phase {
    /// Terminal phases: `completed` on success, `failed` on the error path.
    /// `emergency_recovery` is the tail of the error path and is also final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::EmergencyRecovery)
    }

    /// The next phase on the success path.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::Initializing => Some(Self::SyncCheckpoint),
            Self::SyncCheckpoint => Some(Self::Capturing),
            Self::Capturing => Some(Self::Resolving),
            Self::Resolving => Some(Self::Unifying),
            Self::Unifying => Some(Self::Resuming),
            Self::Resuming => Some(Self::Completed),
            Self::Completed | Self::Failed | Self::EmergencyRecovery => None,
        }
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: Phase) -> bool {
        match (self, to) {
            (Self::Failed, Self::EmergencyRecovery) => true,
            (from, Self::Failed) => !from.is_terminal(),
            (from, to) => from.next() == Some(to),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::SyncCheckpoint => "sync_checkpoint",
            Self::Capturing => "capturing",
            Self::Resolving => "resolving",
            Self::Unifying => "unifying",
            Self::Resuming => "resuming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::EmergencyRecovery => "emergency_recovery",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-node progress within one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Synchronized,
    SyncFailed,
    Captured,
    CaptureFailed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Synchronized => write!(f, "synchronized"),
            Self::SyncFailed => write!(f, "sync_failed"),
            Self::Captured => write!(f, "captured"),
            Self::CaptureFailed => write!(f, "capture_failed"),
        }
    }
}
