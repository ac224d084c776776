use conflux_types::{Conflict, Resolution};

use crate::config::OwnershipTable;
use crate::strategy::{award, CapturedStates, ResolutionStrategy, StrategyKind};

/// The platform that owns the conflict's kind wins outright.
#[derive(Clone, Debug, Default)]
pub struct AuthorityPriority {
    ownership: OwnershipTable,
}

impl AuthorityPriority {
    pub fn new(ownership: OwnershipTable) -> Self {
        Self { ownership }
    }

    pub fn ownership(&self) -> &OwnershipTable {
        &self.ownership
    }
}

impl ResolutionStrategy for AuthorityPriority {
    fn name(&self) -> &str {
        StrategyKind::AuthorityPriority.as_str()
    }

    fn resolve(&self, conflict: &Conflict, states: &CapturedStates) -> Resolution {
        let owner = self.ownership.owner_of(conflict.kind);
        award(
            conflict,
            states,
            self.name(),
            owner,
            &format!("owns {} conflicts", conflict.kind),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::{ConflictKind, Fragment, NodeState, Platform, Severity};
    use serde_json::json;

    fn validation_conflict() -> Conflict {
        Conflict {
            id: "c-0001".into(),
            kind: ConflictKind::RecordDisagreement,
            severity: Severity::High,
            description: "validation kyc differs".into(),
            domain: "validations".into(),
            key: Some("kyc".into()),
            left: Fragment::new(Platform::Protocol, json!(true)),
            right: Fragment::new(Platform::Mirror, json!(false)),
        }
    }

    #[test]
    fn protocol_owns_validations() {
        let r = AuthorityPriority::default().resolve(&validation_conflict(), &CapturedStates::new());
        assert!(r.success);
        assert_eq!(r.winner, Some(Platform::Protocol));
        assert_eq!(r.resolved_value, Some(json!(true)));
        assert_eq!(r.explanation, "protocol wins: owns record-disagreement conflicts");
    }

    #[test]
    fn owner_outside_conflict_read_from_its_state() {
        let ownership = OwnershipTable {
            record_disagreement: Platform::Runtime,
            ..Default::default()
        };
        let at = chrono::DateTime::from_timestamp(0, 0).unwrap();
        let mut states = CapturedStates::new();
        states.insert(
            Platform::Runtime,
            NodeState::from_json(Platform::Runtime, at, json!({"validations": {"kyc": false}})),
        );

        let strategy = AuthorityPriority::new(ownership);
        let r = strategy.resolve(&validation_conflict(), &states);
        assert_eq!(r.winner, Some(Platform::Runtime));
        assert_eq!(r.resolved_value, Some(json!(false)));

        let r = strategy.resolve(&validation_conflict(), &CapturedStates::new());
        assert!(!r.success);
        assert!(r.requires_manual_resolution);
    }
}
