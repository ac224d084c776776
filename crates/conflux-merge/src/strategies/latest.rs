use std::cmp::Ordering;

use conflux_types::{Conflict, Fragment, Resolution};

use crate::strategy::{CapturedStates, ResolutionStrategy, StrategyKind};

/// The fragment with the most recent mutation time wins.
///
/// A fragment with a timestamp beats one without. Equal timestamps, or
/// none on either side, leave the conflict for manual resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatestTimestamp;

impl LatestTimestamp {
    fn win(&self, conflict: &Conflict, winner: &Fragment, reason: String) -> Resolution {
        Resolution::resolved(conflict, self.name(), winner.platform, winner.value.clone(), reason)
    }
}

impl ResolutionStrategy for LatestTimestamp {
    fn name(&self) -> &str {
        StrategyKind::LatestTimestamp.as_str()
    }

    fn resolve(&self, conflict: &Conflict, _states: &CapturedStates) -> Resolution {
        let (left, right) = (&conflict.left, &conflict.right);
        match (left.mutated_at, right.mutated_at) {
            (None, None) => Resolution::unresolved(
                conflict,
                self.name(),
                "neither side carries a mutation time",
            ),
            (Some(t), None) => self.win(conflict, left, format!("{} wins: only timestamped side ({t})", left.platform)),
            (None, Some(t)) => self.win(conflict, right, format!("{} wins: only timestamped side ({t})", right.platform)),
            (Some(l), Some(r)) => match l.cmp(&r) {
                Ordering::Greater => self.win(conflict, left, format!("{} wins: modified at {l}", left.platform)),
                Ordering::Less => self.win(conflict, right, format!("{} wins: modified at {r}", right.platform)),
                Ordering::Equal => Resolution::unresolved(
                    conflict,
                    self.name(),
                    format!("both sides modified at {l}"),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::{ConflictKind, Platform, Severity};
    use serde_json::{json, Value};

    fn conflict(left: Value, right: Value) -> Conflict {
        Conflict {
            id: "c-0001".into(),
            kind: ConflictKind::EntityMismatch,
            severity: Severity::Medium,
            description: "agent A1 differs".into(),
            domain: "agents".into(),
            key: Some("A1".into()),
            left: Fragment::new(Platform::Runtime, left),
            right: Fragment::new(Platform::Surface, right),
        }
    }

    #[test]
    fn newer_side_wins() {
        let c = conflict(
            json!({"trust": 80, "updated_at": "2024-01-01T00:00:00Z"}),
            json!({"trust": 60, "updated_at": "2024-03-01T00:00:00Z"}),
        );
        let r = LatestTimestamp.resolve(&c, &CapturedStates::new());
        assert!(r.success);
        assert_eq!(r.winner, Some(Platform::Surface));
        assert_eq!(r.resolved_value.unwrap()["trust"], json!(60));
    }

    #[test]
    fn epoch_millis_accepted() {
        let c = conflict(
            json!({"trust": 80, "timestamp": 1_700_000_000_500_i64}),
            json!({"trust": 60, "timestamp": 1_700_000_000_000_i64}),
        );
        let r = LatestTimestamp.resolve(&c, &CapturedStates::new());
        assert_eq!(r.winner, Some(Platform::Runtime));
    }

    #[test]
    fn one_sided_timestamp_wins() {
        let c = conflict(json!({"trust": 80}), json!({"trust": 60, "updatedAt": "2024-01-01T00:00:00Z"}));
        let r = LatestTimestamp.resolve(&c, &CapturedStates::new());
        assert_eq!(r.winner, Some(Platform::Surface));
    }

    #[test]
    fn no_timestamps_requires_manual() {
        let c = conflict(json!({"trust": 80}), json!({"trust": 60}));
        let r = LatestTimestamp.resolve(&c, &CapturedStates::new());
        assert!(!r.success);
        assert!(r.requires_manual_resolution);
        assert!(r.resolved_value.is_none());
    }

    #[test]
    fn tie_requires_manual() {
        let c = conflict(
            json!({"trust": 80, "updated_at": "2024-01-01T00:00:00Z"}),
            json!({"trust": 60, "updated_at": "2024-01-01T00:00:00Z"}),
        );
        let r = LatestTimestamp.resolve(&c, &CapturedStates::new());
        assert!(!r.success);
        assert!(r.explanation.starts_with("both sides modified at"));
    }
}
