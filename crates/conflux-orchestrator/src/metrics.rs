use std::collections::BTreeMap;

use conflux_types::ConflictKind;
use serde::{Deserialize, Serialize};

use crate::repository::SessionRepository;

/// Point-in-time view of merge activity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeMetrics {
    /// Merges currently running.
    pub active: usize,
    /// Merges finished, successfully or not.
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// `succeeded / total`, or 0 before the first merge finishes.
    pub success_rate: f64,
    /// Mean wall time of finished merges.
    pub average_duration_ms: f64,
    pub conflicts_by_kind: BTreeMap<ConflictKind, u64>,
}

impl MergeMetrics {
    pub fn collect(repository: &SessionRepository) -> Self {
        let tally = repository.tally();
        let (success_rate, average_duration_ms) = if tally.finished == 0 {
            (0.0, 0.0)
        } else {
            (
                tally.succeeded as f64 / tally.finished as f64,
                tally.total_duration_ms as f64 / tally.finished as f64,
            )
        };

        Self {
            active: repository.active_count(),
            total: tally.finished,
            succeeded: tally.succeeded,
            failed: tally.failed,
            success_rate,
            average_duration_ms,
            conflicts_by_kind: tally.conflicts_by_kind.clone(),
        }
    }
}
