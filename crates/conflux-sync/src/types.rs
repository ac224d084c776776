use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use conflux_types::{NodeState, Platform};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// A node that did not complete an operation, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub platform: Platform,
    pub reason: String,
}

impl NodeFailure {
    pub fn new(platform: Platform, reason: impl Into<String>) -> Self {
        Self {
            platform,
            reason: reason.into(),
        }
    }
}

/// Outcome of a checkpoint broadcast.
#[derive(Clone, Debug)]
pub struct CheckpointReport {
    /// The instant nodes were asked to settle around.
    pub sync_instant: DateTime<Utc>,
    /// Nodes that acknowledged before the sync instant, in canonical order.
    pub acknowledged: Vec<Platform>,
    /// Nodes that rejected the command or answered too late.
    pub failures: Vec<NodeFailure>,
    /// Wall time spent, including the settling wait.
    pub elapsed: Duration,
}

impl CheckpointReport {
    pub fn all_acknowledged(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a parallel state capture.
#[derive(Clone, Debug, Default)]
pub struct CaptureReport {
    pub states: BTreeMap<Platform, NodeState>,
    pub failed: Vec<NodeFailure>,
    pub duration: Duration,
}

impl CaptureReport {
    /// Fail if no node contributed a state.
    pub fn require_any(self) -> SyncResult<Self> {
        if self.states.is_empty() {
            return Err(SyncError::NothingCaptured(self.failed));
        }
        Ok(self)
    }
}

/// Outcome of resuming every node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReport {
    pub resumed: Vec<Platform>,
    pub failed: Vec<NodeFailure>,
}

impl ResumeReport {
    pub fn all_resumed(&self) -> bool {
        self.failed.is_empty()
    }
}
