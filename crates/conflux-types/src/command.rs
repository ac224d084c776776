use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::{Platform, SessionId};

/// The kind of command the merge subsystem sends to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Settle around the sync instant and pause autonomous work.
    SyncCheckpoint,
    /// Leave the checkpoint and resume autonomous work.
    ResumeAutonomousOperations,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncCheckpoint => write!(f, "SYNC_CHECKPOINT"),
            Self::ResumeAutonomousOperations => write!(f, "RESUME_AUTONOMOUS_OPERATIONS"),
        }
    }
}

/// Instruction flags carried by a checkpoint command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFlags {
    /// Stop accepting new autonomous work.
    pub pause_new_work: bool,
    /// Finish work already in flight before the sync instant.
    pub complete_in_flight: bool,
    /// Keep heartbeats flowing while paused.
    pub keep_heartbeat: bool,
}

impl Default for CheckpointFlags {
    fn default() -> Self {
        Self {
            pause_new_work: true,
            complete_in_flight: true,
            keep_heartbeat: true,
        }
    }
}

/// A command delivered to one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCommand {
    pub kind: CommandKind,
    /// The merge session issuing the command.
    pub session: SessionId,
    /// The instant nodes should settle around (checkpoint only).
    pub sync_instant: Option<DateTime<Utc>>,
    /// Checkpoint flags (checkpoint only).
    pub flags: Option<CheckpointFlags>,
}

impl NodeCommand {
    /// A checkpoint command for the given session and instant.
    pub fn checkpoint(session: SessionId, sync_instant: DateTime<Utc>, flags: CheckpointFlags) -> Self {
        Self {
            kind: CommandKind::SyncCheckpoint,
            session,
            sync_instant: Some(sync_instant),
            flags: Some(flags),
        }
    }

    /// A resume-from-checkpoint command for the given session.
    pub fn resume(session: SessionId) -> Self {
        Self {
            kind: CommandKind::ResumeAutonomousOperations,
            session,
            sync_instant: None,
            flags: None,
        }
    }
}

/// A node's acknowledgement of a command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub platform: Platform,
    pub kind: CommandKind,
    pub acknowledged_at: DateTime<Utc>,
}
