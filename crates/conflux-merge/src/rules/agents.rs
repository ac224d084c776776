use conflux_types::state::{entry_body, keyed_entries};
use conflux_types::{ConflictKind, Platform, Severity};
use serde_json::Value;

use crate::rule::{DetectionRule, Finding};

/// Agent records appear in both the runtime and surface exports.
///
/// Each agent present on both sides is compared by deep structural
/// equality, ignoring the record's own id field; one conflict is raised
/// per differing agent. Agents reported
/// by only one side are not conflicts.
pub struct AgentRecordRule;

impl DetectionRule for AgentRecordRule {
    fn name(&self) -> &str {
        "agent-records"
    }

    fn domain(&self) -> &str {
        "agents"
    }

    fn sources(&self) -> (Platform, Platform) {
        (Platform::Runtime, Platform::Surface)
    }

    fn kind(&self) -> ConflictKind {
        ConflictKind::EntityMismatch
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn compare(&self, left: &Value, right: &Value) -> Vec<Finding> {
        if left == right {
            return Vec::new();
        }
        let (Some(l), Some(r)) = (keyed_entries(left), keyed_entries(right)) else {
            return vec![Finding::whole(left, right, "agent collections differ structurally")];
        };

        l.iter()
            .filter_map(|(id, lv)| {
                let rv = r.get(id)?;
                (entry_body(id, lv) != entry_body(id, rv)).then(|| {
                    Finding::entry(id.clone(), lv, rv, format!("agent {id} differs between runtime and surface"))
                })
            })
            .collect()
    }
}
