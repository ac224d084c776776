use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use conflux_node::NodeGroup;
use conflux_sync::{NodeFailure, ResumeReport};
use conflux_types::{Conflict, NodeStatus, Phase, Platform, Resolution, SessionId, TypeError};

/// One entry in a session's phase history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

/// Why a session failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    /// The phase that was running when the failure happened.
    pub phase: Phase,
    pub reason: String,
}

/// The record of one merge attempt.
///
/// Absorbed node failures (missed acknowledgements, failed exports,
/// failed resumes) are recorded here and never abort the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeSession {
    pub id: SessionId,
    /// Name of the node group being merged.
    pub group: String,
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub history: Vec<PhaseChange>,
    pub node_status: BTreeMap<Platform, NodeStatus>,
    pub sync_instant: Option<DateTime<Utc>>,
    pub node_failures: Vec<NodeFailure>,
    pub conflicts: Vec<Conflict>,
    pub resolutions: Vec<Resolution>,
    /// Digest of the sealed snapshot, once unified.
    pub digest: Option<String>,
    /// Outcome of the normal resume after a completed merge.
    pub resume: Option<ResumeReport>,
    /// Outcome of emergency recovery after a failure.
    pub recovery: Option<ResumeReport>,
    pub failure: Option<SessionFailure>,
    pub retry_count: u32,
    pub retry_of: Option<SessionId>,
}

impl MergeSession {
    /// A fresh session in `initializing`, with every node pending.
    pub fn new(group: &NodeGroup, strategy: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            group: group.name().to_string(),
            strategy: strategy.into(),
            started_at: now,
            ended_at: None,
            phase: Phase::Initializing,
            history: vec![PhaseChange {
                phase: Phase::Initializing,
                at: now,
            }],
            node_status: group
                .platforms()
                .into_iter()
                .map(|p| (p, NodeStatus::Pending))
                .collect(),
            sync_instant: None,
            node_failures: Vec::new(),
            conflicts: Vec::new(),
            resolutions: Vec::new(),
            digest: None,
            resume: None,
            recovery: None,
            failure: None,
            retry_count: 0,
            retry_of: None,
        }
    }

    /// Mark this session as a caller-driven retry of `previous`.
    pub fn retrying(mut self, previous: &MergeSession) -> Self {
        self.retry_of = Some(previous.id);
        self.retry_count = previous.retry_count + 1;
        self
    }

    /// Move to `to`, recording the change. Illegal transitions are rejected
    /// and leave the session untouched.
    pub fn transition(&mut self, to: Phase) -> Result<(), TypeError> {
        if !self.phase.can_transition_to(to) {
            return Err(TypeError::IllegalTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }
        let now = Utc::now();
        self.phase = to;
        self.history.push(PhaseChange { phase: to, at: now });
        if to.is_terminal() {
            self.ended_at = Some(now);
        }
        Ok(())
    }

    /// Record the failure of the running phase and move to `failed`.
    ///
    /// A session that already reached a terminal phase keeps it; only the
    /// first failure is recorded.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(SessionFailure {
                phase: self.phase,
                reason: reason.into(),
            });
        }
        if let Err(e) = self.transition(Phase::Failed) {
            warn!(session = %self.id, phase = %self.phase, error = %e, "failure not recorded as a phase change");
        }
    }

    pub fn set_status(&mut self, platform: Platform, status: NodeStatus) {
        self.node_status.insert(platform, status);
    }

    pub fn status_of(&self, platform: Platform) -> Option<NodeStatus> {
        self.node_status.get(&platform).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Wall time from start to end, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// Conflicts whose resolution requires manual follow-up.
    pub fn unresolved_count(&self) -> usize {
        self.resolutions.iter().filter(|r| !r.success).count()
    }

    /// The phases visited, in order.
    pub fn phases(&self) -> Vec<Phase> {
        self.history.iter().map(|c| c.phase).collect()
    }
}
