use std::time::Duration;

use conflux_types::{CheckpointFlags, ExportOptions};
use serde::{Deserialize, Serialize};

/// Timing and payload configuration for node fan-out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Settling window between the checkpoint broadcast and the sync instant.
    pub sync_window_ms: u64,
    /// Per-node bound on delivering a command. A checkpoint is also bounded
    /// by the sync instant, whichever comes first.
    pub command_timeout_ms: u64,
    /// Per-node bound on a state export.
    pub capture_timeout_ms: u64,
    /// Per-node bound on a resume (normal or emergency).
    pub resume_timeout_ms: u64,
    /// Flags carried by every checkpoint command.
    pub flags: CheckpointFlags,
    /// What nodes are asked to include in their export.
    pub export: ExportOptions,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_window_ms: 2_000,
            command_timeout_ms: 5_000,
            capture_timeout_ms: 15_000,
            resume_timeout_ms: 5_000,
            flags: CheckpointFlags::default(),
            export: ExportOptions::default(),
        }
    }
}

impl SyncConfig {
    pub fn sync_window(&self) -> Duration {
        Duration::from_millis(self.sync_window_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn resume_timeout(&self) -> Duration {
        Duration::from_millis(self.resume_timeout_ms)
    }
}
