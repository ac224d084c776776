use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use conflux_node::NodeGroup;
use conflux_types::{NodeCommand, SessionId};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::types::{CheckpointReport, NodeFailure};

/// Broadcasts the sync checkpoint and waits out the settling window.
///
/// The sync instant is `now + window`. Nodes must acknowledge before that
/// instant; a late or failed acknowledgement marks only that node as
/// unsynchronized. The coordinator always waits until the sync instant so
/// acknowledging nodes get the full window to settle.
pub struct SyncCoordinator {
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run a checkpoint with the configured window.
    pub async fn checkpoint(
        &self,
        session: SessionId,
        group: &NodeGroup,
    ) -> SyncResult<CheckpointReport> {
        self.checkpoint_with_window(session, group, self.config.sync_window())
            .await
    }

    /// Run a checkpoint with an explicit window.
    pub async fn checkpoint_with_window(
        &self,
        session: SessionId,
        group: &NodeGroup,
        window: Duration,
    ) -> SyncResult<CheckpointReport> {
        if group.is_empty() {
            return Err(SyncError::EmptyGroup);
        }

        let started = Instant::now();
        let out_of_range = || SyncError::WindowOutOfRange(window);
        let deadline = started.checked_add(window).ok_or_else(out_of_range)?;
        let ack_deadline = started
            .checked_add(self.config.command_timeout())
            .map_or(deadline, |t| t.min(deadline));
        let sync_instant = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_add_signed(w))
            .ok_or_else(out_of_range)?;
        let command = NodeCommand::checkpoint(session, sync_instant, self.config.flags);

        info!(
            session = %session,
            nodes = group.len(),
            window_ms = window.as_millis() as u64,
            %sync_instant,
            "broadcasting sync checkpoint"
        );

        let sends = group.nodes().iter().map(|node| {
            let command = &command;
            async move {
                let platform = node.platform();
                let outcome =
                    tokio::time::timeout_at(ack_deadline, node.receive_command(command)).await;
                (platform, outcome)
            }
        });
        let outcomes = join_all(sends).await;

        let mut acknowledged = Vec::new();
        let mut failures = Vec::new();
        for (platform, outcome) in outcomes {
            match outcome {
                Ok(Ok(_)) => {
                    debug!(%platform, "checkpoint acknowledged");
                    acknowledged.push(platform);
                }
                Ok(Err(e)) => {
                    warn!(%platform, error = %e, "checkpoint not acknowledged");
                    failures.push(NodeFailure::new(platform, e.to_string()));
                }
                Err(_) => {
                    warn!(%platform, "no acknowledgement before sync instant");
                    failures.push(NodeFailure::new(
                        platform,
                        "no acknowledgement before sync instant",
                    ));
                }
            }
        }
        acknowledged.sort();
        failures.sort_by_key(|f| f.platform);

        tokio::time::sleep_until(deadline).await;

        info!(
            session = %session,
            acknowledged = acknowledged.len(),
            failed = failures.len(),
            "sync window elapsed"
        );

        Ok(CheckpointReport {
            sync_instant,
            acknowledged,
            failures,
            elapsed: started.elapsed(),
        })
    }
}
