use std::collections::BTreeMap;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use conflux_node::NodeGroup;
use conflux_types::SessionId;

use crate::config::SyncConfig;
use crate::types::{CaptureReport, NodeFailure};

/// Requests a state export from every node in parallel.
///
/// A failing or slow node contributes nothing and is listed in
/// [`CaptureReport::failed`]; it never blocks the capture of the others.
/// Capture is attempted on every node regardless of checkpoint status.
pub struct StateCapturer {
    config: SyncConfig,
}

impl StateCapturer {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub async fn capture_all(&self, session: SessionId, group: &NodeGroup) -> CaptureReport {
        let started = Instant::now();
        let timeout = self.config.capture_timeout();
        let options = &self.config.export;

        let exports = group.nodes().iter().map(|node| async move {
            let platform = node.platform();
            let outcome = tokio::time::timeout(timeout, node.export_state(options)).await;
            (platform, outcome)
        });
        let outcomes = join_all(exports).await;

        let mut states = BTreeMap::new();
        let mut failed = Vec::new();
        for (platform, outcome) in outcomes {
            match outcome {
                Ok(Ok(state)) if state.platform() != platform => {
                    warn!(%platform, reported = %state.platform(), "export reported wrong platform");
                    failed.push(NodeFailure::new(
                        platform,
                        format!("export reported platform {}", state.platform()),
                    ));
                }
                Ok(Ok(state)) => {
                    debug!(%platform, domains = state.document().len(), "state captured");
                    states.insert(platform, state);
                }
                Ok(Err(e)) => {
                    warn!(%platform, error = %e, "state capture failed");
                    failed.push(NodeFailure::new(platform, e.to_string()));
                }
                Err(_) => {
                    warn!(%platform, timeout_ms = timeout.as_millis() as u64, "state capture timed out");
                    failed.push(NodeFailure::new(platform, "export timed out"));
                }
            }
        }
        failed.sort_by_key(|f| f.platform);

        let duration = started.elapsed();
        info!(
            session = %session,
            captured = states.len(),
            failed = failed.len(),
            duration_ms = duration.as_millis() as u64,
            "state capture finished"
        );

        CaptureReport {
            states,
            failed,
            duration,
        }
    }
}
