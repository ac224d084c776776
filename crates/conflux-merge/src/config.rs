use std::collections::BTreeMap;

use conflux_types::{ConflictKind, Platform};
use serde::{Deserialize, Serialize};

/// Which platform owns each kind of conflict under authority-priority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnershipTable {
    pub entity_mismatch: Platform,
    pub sequence_divergence: Platform,
    pub scalar_drift: Platform,
    pub record_disagreement: Platform,
}

impl Default for OwnershipTable {
    fn default() -> Self {
        Self {
            entity_mismatch: Platform::Runtime,
            sequence_divergence: Platform::Mirror,
            scalar_drift: Platform::Surface,
            record_disagreement: Platform::Protocol,
        }
    }
}

impl OwnershipTable {
    pub fn owner_of(&self, kind: ConflictKind) -> Platform {
        match kind {
            ConflictKind::EntityMismatch => self.entity_mismatch,
            ConflictKind::SequenceDivergence => self.sequence_divergence,
            ConflictKind::ScalarDrift => self.scalar_drift,
            ConflictKind::RecordDisagreement => self.record_disagreement,
        }
    }
}

/// Deployment-tunable merge rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRules {
    /// Conflict kind -> owning platform.
    pub ownership: OwnershipTable,
    /// Domain -> platform whose value is the unification baseline.
    pub baselines: BTreeMap<String, Platform>,
    /// Mood intensities closer than this are considered equal.
    pub mood_tolerance: f64,
}

impl Default for MergeRules {
    fn default() -> Self {
        let baselines = [
            ("agents", Platform::Runtime),
            ("timeline", Platform::Mirror),
            ("mood", Platform::Surface),
            ("validations", Platform::Protocol),
        ]
        .into_iter()
        .map(|(d, p)| (d.to_string(), p))
        .collect();

        Self {
            ownership: OwnershipTable::default(),
            baselines,
            mood_tolerance: 0.1,
        }
    }
}

impl MergeRules {
    /// The configured baseline platform for a domain, if it is tracked.
    pub fn baseline_for(&self, domain: &str) -> Option<Platform> {
        self.baselines.get(domain).copied()
    }
}
