use conflux_types::state::record_id;
use conflux_types::{ConflictKind, Platform, Severity};
use serde_json::Value;

use crate::rule::{DetectionRule, Finding};

/// Ritual/event timelines appear in both the mirror and runtime exports.
///
/// Timelines are compared as ordered identity sequences: a conflict is
/// raised if the lengths differ or any position holds a different element
/// id. Elements without an id are compared by value.
pub struct TimelineRule;

fn identity(entry: &Value) -> Value {
    match record_id(entry) {
        Some(id) => Value::String(id),
        None => entry.clone(),
    }
}

impl DetectionRule for TimelineRule {
    fn name(&self) -> &str {
        "event-timeline"
    }

    fn domain(&self) -> &str {
        "timeline"
    }

    fn sources(&self) -> (Platform, Platform) {
        (Platform::Mirror, Platform::Runtime)
    }

    fn kind(&self) -> ConflictKind {
        ConflictKind::SequenceDivergence
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn compare(&self, left: &Value, right: &Value) -> Vec<Finding> {
        let (Value::Array(l), Value::Array(r)) = (left, right) else {
            if left == right {
                return Vec::new();
            }
            return vec![Finding::whole(left, right, "timelines are not comparable sequences")];
        };

        if l.len() != r.len() {
            return vec![Finding::whole(
                left,
                right,
                format!("timeline lengths differ: mirror has {}, runtime has {}", l.len(), r.len()),
            )];
        }

        match l
            .iter()
            .zip(r.iter())
            .position(|(a, b)| identity(a) != identity(b))
        {
            Some(pos) => vec![Finding::whole(
                left,
                right,
                format!("timeline diverges at position {pos}"),
            )],
            None => Vec::new(),
        }
    }
}
