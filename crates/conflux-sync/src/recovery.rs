use futures::future::join_all;
use tracing::{error, info, warn};

use conflux_node::NodeGroup;
use conflux_types::{NodeCommand, SessionId};

use crate::config::SyncConfig;
use crate::types::{NodeFailure, ResumeReport};

/// Returns every node to autonomous operation.
///
/// [`Self::resume_all`] is the normal path after a completed merge.
/// [`Self::emergency_resume`] runs when the merge pipeline fails anywhere;
/// it never returns an error, so a bug in conflict logic cannot leave a
/// node paused.
pub struct RecoveryManager {
    config: SyncConfig,
}

impl RecoveryManager {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Send a resume-from-checkpoint command to every node.
    pub async fn resume_all(&self, session: SessionId, group: &NodeGroup) -> ResumeReport {
        let timeout = self.config.resume_timeout();
        let command = NodeCommand::resume(session);

        let sends = group.nodes().iter().map(|node| {
            let command = &command;
            async move {
                let platform = node.platform();
                let outcome = tokio::time::timeout(timeout, node.receive_command(command)).await;
                (platform, outcome.map_err(|_| "resume timed out".to_string()))
            }
        });

        let mut report = ResumeReport::default();
        for (platform, outcome) in join_all(sends).await {
            match outcome {
                Ok(Ok(_)) => report.resumed.push(platform),
                Ok(Err(e)) => {
                    warn!(%platform, error = %e, "node failed to resume");
                    report.failed.push(NodeFailure::new(platform, e.to_string()));
                }
                Err(reason) => {
                    warn!(%platform, "node resume timed out");
                    report.failed.push(NodeFailure::new(platform, reason));
                }
            }
        }
        report.resumed.sort();
        report.failed.sort_by_key(|f| f.platform);

        info!(
            session = %session,
            resumed = report.resumed.len(),
            failed = report.failed.len(),
            "resume finished"
        );
        report
    }

    /// Unconditionally attempt to resume every node through its emergency
    /// path. Per-node errors are logged and recorded, never propagated.
    pub async fn emergency_resume(&self, group: &NodeGroup) -> ResumeReport {
        let timeout = self.config.resume_timeout();

        let calls = group.nodes().iter().map(|node| async move {
            let platform = node.platform();
            let outcome = tokio::time::timeout(timeout, node.emergency_resume()).await;
            (platform, outcome)
        });

        let mut report = ResumeReport::default();
        for (platform, outcome) in join_all(calls).await {
            match outcome {
                Ok(Ok(())) => report.resumed.push(platform),
                Ok(Err(e)) => {
                    error!(%platform, error = %e, "emergency resume failed");
                    report.failed.push(NodeFailure::new(platform, e.to_string()));
                }
                Err(_) => {
                    error!(%platform, "emergency resume timed out");
                    report
                        .failed
                        .push(NodeFailure::new(platform, "emergency resume timed out"));
                }
            }
        }
        report.resumed.sort();
        report.failed.sort_by_key(|f| f.platform);

        warn!(
            resumed = report.resumed.len(),
            failed = report.failed.len(),
            "emergency resume finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use conflux_node::{FaultPlan, InMemoryNode, NodeAdapter};
    use conflux_types::{CheckpointFlags, CommandKind, Platform};

    async fn paused_nodes(faults: &[(Platform, FaultPlan)]) -> (NodeGroup, Vec<Arc<InMemoryNode>>) {
        let mut group = NodeGroup::new("test");
        let mut nodes = Vec::new();
        for p in Platform::ALL {
            let plan = faults
                .iter()
                .find(|(fp, _)| *fp == p)
                .map(|(_, plan)| plan.clone())
                .unwrap_or_default();
            let node = Arc::new(InMemoryNode::new(p).with_faults(plan));
            let cmd = NodeCommand::checkpoint(SessionId::new(), chrono::Utc::now(), CheckpointFlags::default());
            let _ = node.receive_command(&cmd).await;
            group.add(node.clone()).unwrap();
            nodes.push(node);
        }
        (group, nodes)
    }

    #[tokio::test]
    async fn resume_all_unpauses_every_node() {
        let (group, nodes) = paused_nodes(&[]).await;
        let report = RecoveryManager::new(SyncConfig::default())
            .resume_all(SessionId::new(), &group)
            .await;
        assert!(report.all_resumed());
        assert_eq!(report.resumed, Platform::ALL.to_vec());
        for n in nodes {
            assert!(!n.is_paused());
            let last = n.commands().pop().unwrap();
            assert_eq!(last.kind, CommandKind::ResumeAutonomousOperations);
        }
    }

    #[tokio::test]
    async fn resume_failures_are_recorded_independently() {
        let (group, nodes) = paused_nodes(&[(
            Platform::Surface,
            FaultPlan {
                fail_resume: true,
                ..Default::default()
            },
        )])
        .await;
        let report = RecoveryManager::new(SyncConfig::default())
            .resume_all(SessionId::new(), &group)
            .await;
        assert_eq!(report.resumed.len(), 3);
        assert_eq!(report.failed[0].platform, Platform::Surface);
        assert!(nodes[1].is_paused());
        assert!(!nodes[0].is_paused());
    }

    #[tokio::test]
    async fn emergency_resume_swallows_errors() {
        let (group, nodes) = paused_nodes(&[(
            Platform::Mirror,
            FaultPlan {
                fail_emergency_resume: true,
                ..Default::default()
            },
        )])
        .await;
        let report = RecoveryManager::new(SyncConfig::default())
            .emergency_resume(&group)
            .await;
        assert_eq!(report.resumed, vec![Platform::Runtime, Platform::Surface, Platform::Protocol]);
        assert_eq!(report.failed[0].platform, Platform::Mirror);
        for n in &nodes {
            assert_eq!(n.emergency_resumes(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_resume_times_out() {
        let (group, _nodes) = paused_nodes(&[]).await;
        let slow = InMemoryNode::new(Platform::Runtime).with_faults(FaultPlan {
            ack_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let slow_group = NodeGroup::new("slow")
            .with_node(Arc::new(slow) as Arc<dyn NodeAdapter>)
            .unwrap();
        let manager = RecoveryManager::new(SyncConfig {
            resume_timeout_ms: 50,
            ..Default::default()
        });
        let report = manager.resume_all(SessionId::new(), &slow_group).await;
        assert_eq!(report.failed[0].reason, "resume timed out");
        assert!(manager.resume_all(SessionId::new(), &group).await.all_resumed());
    }
}
