//! In-process node for tests, demos, and the CLI.
//!
//! [`InMemoryNode`] keeps its state document in a `RwLock` and records
//! every command it receives. A [`FaultPlan`] injects failures and delays
//! so partial-failure paths can be exercised without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use conflux_types::{
    CommandAck, CommandKind, ExportOptions, NodeCommand, NodeState, Platform, StateDocument,
};

use crate::adapter::NodeAdapter;
use crate::error::{NodeError, NodeResult};

/// Failures and delays an [`InMemoryNode`] should simulate.
#[derive(Clone, Debug, Default)]
pub struct FaultPlan {
    pub fail_commands: bool,
    pub fail_export: bool,
    pub fail_resume: bool,
    pub fail_emergency_resume: bool,
    /// Delay before acknowledging any command.
    pub ack_delay: Option<Duration>,
    /// Delay before returning an export.
    pub export_delay: Option<Duration>,
}

/// An in-memory implementation of [`NodeAdapter`].
#[derive(Debug)]
pub struct InMemoryNode {
    platform: Platform,
    document: RwLock<StateDocument>,
    faults: FaultPlan,
    paused: AtomicBool,
    commands: Mutex<Vec<NodeCommand>>,
    emergency_resumes: AtomicUsize,
}

impl InMemoryNode {
    /// Create a node with an empty state document.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            document: RwLock::new(StateDocument::new()),
            faults: FaultPlan::default(),
            paused: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
            emergency_resumes: AtomicUsize::new(0),
        }
    }

    /// Create a node whose state is the given JSON object.
    pub fn with_state(platform: Platform, state: Value) -> Self {
        let node = Self::new(platform);
        if let Value::Object(map) = state {
            *node.document.write().expect("node state lock poisoned") =
                map.into_iter().collect();
        }
        node
    }

    /// Attach a fault plan.
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Replace one domain's value.
    pub fn set_domain(&self, domain: impl Into<String>, value: Value) {
        self.document
            .write()
            .expect("node state lock poisoned")
            .insert(domain.into(), value);
    }

    /// Whether the node is currently paused at a checkpoint.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<NodeCommand> {
        self.commands.lock().expect("command log lock poisoned").clone()
    }

    /// Number of emergency resume calls received.
    pub fn emergency_resumes(&self) -> usize {
        self.emergency_resumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeAdapter for InMemoryNode {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn receive_command(&self, command: &NodeCommand) -> NodeResult<CommandAck> {
        if let Some(delay) = self.faults.ack_delay {
            tokio::time::sleep(delay).await;
        }
        self.commands
            .lock()
            .map_err(|e| NodeError::Transport(format!("lock poisoned: {e}")))?
            .push(command.clone());

        let failing = match command.kind {
            CommandKind::SyncCheckpoint => self.faults.fail_commands,
            CommandKind::ResumeAutonomousOperations => {
                self.faults.fail_commands || self.faults.fail_resume
            }
        };
        if failing {
            return Err(NodeError::Rejected {
                platform: self.platform,
                reason: format!("injected failure for {}", command.kind),
            });
        }

        let pause = command.kind == CommandKind::SyncCheckpoint
            && command.flags.map(|f| f.pause_new_work).unwrap_or(true);
        self.paused.store(pause, Ordering::SeqCst);
        debug!(platform = %self.platform, kind = %command.kind, paused = pause, "command applied");

        Ok(CommandAck {
            platform: self.platform,
            kind: command.kind,
            acknowledged_at: Utc::now(),
        })
    }

    async fn export_state(&self, options: &ExportOptions) -> NodeResult<NodeState> {
        if let Some(delay) = self.faults.export_delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.fail_export {
            return Err(NodeError::ExportFailed {
                platform: self.platform,
                reason: "injected export failure".into(),
            });
        }
        let document = self
            .document
            .read()
            .map_err(|e| NodeError::Transport(format!("lock poisoned: {e}")))?;
        let exported: StateDocument = document
            .iter()
            .filter(|(domain, _)| options.includes(domain))
            .filter(|(domain, _)| options.include_metadata || !domain.starts_with('_'))
            .map(|(k, v)| (k.clone(), options.shape(k, v)))
            .collect();
        Ok(NodeState::new(self.platform, Utc::now(), exported))
    }

    async fn emergency_resume(&self) -> NodeResult<()> {
        self.emergency_resumes.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_emergency_resume {
            return Err(NodeError::ResumeFailed {
                platform: self.platform,
                reason: "injected emergency resume failure".into(),
            });
        }
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }
}
