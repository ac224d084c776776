use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::debug;

use conflux_types::state::{record_id, replace_entry};
use conflux_types::{Conflict, FieldProvenance, Platform, Resolution, StateDocument, UnifiedSnapshot};

use crate::config::MergeRules;
use crate::error::{MergeError, MergeResult};
use crate::strategy::CapturedStates;

/// Builds the unified snapshot from captured states and resolutions.
///
/// Every domain starts from its baseline platform's value. Successful
/// resolutions are then overlaid at their conflict's path; unsuccessful
/// ones leave the baseline in place and mark the path unresolved.
#[derive(Clone, Debug, Default)]
pub struct StateUnifier {
    rules: MergeRules,
}

impl StateUnifier {
    pub fn new(rules: MergeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &MergeRules {
        &self.rules
    }

    /// The platform a domain's baseline value is taken from.
    ///
    /// The configured baseline if it captured the domain, otherwise the
    /// first platform in canonical order that did.
    pub fn baseline_source(&self, domain: &str, states: &CapturedStates) -> Option<Platform> {
        let reports = |p: &Platform| states.get(p).is_some_and(|s| s.domain(domain).is_some());
        self.rules
            .baseline_for(domain)
            .filter(reports)
            .or_else(|| Platform::ALL.into_iter().find(|p| reports(p)))
    }

    /// Merge `states` with the resolutions of `conflicts`.
    ///
    /// Every conflict must have exactly one resolution and every resolution
    /// must refer to a known conflict.
    pub fn unify(
        &self,
        states: &CapturedStates,
        conflicts: &[Conflict],
        resolutions: &[Resolution],
    ) -> MergeResult<UnifiedSnapshot> {
        let by_conflict = pair_resolutions(conflicts, resolutions)?;

        let domains: BTreeSet<&str> = states.values().flat_map(|s| s.domains()).collect();
        let mut document = StateDocument::new();
        let mut provenance = BTreeMap::new();
        let mut sources = BTreeMap::new();

        for domain in domains {
            let Some(source) = self.baseline_source(domain, states) else {
                continue;
            };
            let Some(value) = states.get(&source).and_then(|s| s.domain(domain)) else {
                continue;
            };
            document.insert(domain.to_string(), value.clone());
            provenance.insert(
                domain.to_string(),
                FieldProvenance::baseline(source, contributors(states, domain, None)),
            );
            sources.insert(domain.to_string(), source);
        }

        for conflict in conflicts {
            let Some(resolution) = by_conflict.get(conflict.id.as_str()) else {
                return Err(MergeError::ResolutionCount {
                    conflict_id: conflict.id.clone(),
                    count: 0,
                });
            };
            let path = conflict.path();
            let contributors = contributors(states, &conflict.domain, conflict.key.as_deref());

            let entry = match (&resolution.resolved_value, resolution.success) {
                (Some(value), true) => {
                    overlay(&mut document, conflict, value.clone());
                    let winner = resolution.winner;
                    FieldProvenance {
                        source: winner,
                        contributors,
                        resolved_over: conflict
                            .platforms()
                            .into_iter()
                            .filter(|p| Some(*p) != winner)
                            .collect(),
                        conflict_id: Some(conflict.id.clone()),
                        unresolved: false,
                    }
                }
                _ => FieldProvenance {
                    source: sources.get(&conflict.domain).copied(),
                    contributors,
                    resolved_over: Vec::new(),
                    conflict_id: Some(conflict.id.clone()),
                    unresolved: true,
                },
            };
            provenance.insert(path, entry);
        }

        let snapshot = UnifiedSnapshot::seal(document, provenance, conflicts.to_vec(), resolutions.to_vec())?;
        debug!(
            domains = snapshot.document().len(),
            unresolved = snapshot.unresolved().len(),
            digest = %snapshot.digest(),
            "snapshot sealed"
        );
        Ok(snapshot)
    }
}

fn pair_resolutions<'a>(
    conflicts: &[Conflict],
    resolutions: &'a [Resolution],
) -> MergeResult<BTreeMap<&'a str, &'a Resolution>> {
    let known: BTreeSet<&str> = conflicts.iter().map(|c| c.id.as_str()).collect();
    let mut paired: BTreeMap<&str, &Resolution> = BTreeMap::new();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for r in resolutions {
        if !known.contains(r.conflict_id.as_str()) {
            return Err(MergeError::UnknownConflict(r.conflict_id.clone()));
        }
        *counts.entry(r.conflict_id.as_str()).or_default() += 1;
        paired.insert(r.conflict_id.as_str(), r);
    }

    for c in conflicts {
        let count = counts.get(c.id.as_str()).copied().unwrap_or(0);
        if count != 1 {
            return Err(MergeError::ResolutionCount {
                conflict_id: c.id.clone(),
                count,
            });
        }
    }
    Ok(paired)
}

/// Platforms that reported a value at `domain` (and `key`), in canonical order.
fn contributors(states: &CapturedStates, domain: &str, key: Option<&str>) -> Vec<Platform> {
    states
        .iter()
        .filter(|(_, s)| s.value_at(domain, key).is_some())
        .map(|(p, _)| *p)
        .collect()
}

fn overlay(document: &mut StateDocument, conflict: &Conflict, value: Value) {
    let Some(key) = conflict.key.as_deref() else {
        document.insert(conflict.domain.clone(), value);
        return;
    };

    let slot = document
        .entry(conflict.domain.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !replace_entry(slot, key, value.clone()) {
        match slot {
            Value::Array(items) => {
                let mut value = value;
                if record_id(&value).is_none() {
                    if let Value::Object(record) = &mut value {
                        record.insert("id".to_string(), Value::String(key.to_string()));
                    }
                }
                items.push(value);
            }
            other => {
                let mut map = Map::new();
                map.insert(key.to_string(), value);
                *other = Value::Object(map);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::{ConflictKind, Fragment, NodeState, Severity};
    use serde_json::json;

    use crate::detector::ConflictDetector;
    use crate::resolver::ConflictResolver;

    fn states(pairs: &[(Platform, Value)]) -> CapturedStates {
        let at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        pairs
            .iter()
            .map(|(p, v)| (*p, NodeState::from_json(*p, at, v.clone())))
            .collect()
    }

    fn merge(states: &CapturedStates, strategy: &str) -> UnifiedSnapshot {
        let rules = MergeRules::default();
        let conflicts = ConflictDetector::with_default_rules(&rules).detect(states);
        let resolutions = ConflictResolver::with_builtin_strategies(&rules)
            .resolve_all(&conflicts, states, strategy)
            .unwrap();
        StateUnifier::new(rules).unify(states, &conflicts, &resolutions).unwrap()
    }

    fn four_nodes() -> CapturedStates {
        states(&[
            (Platform::Runtime, json!({"agents": {"A1": {"trust": 80}}, "timeline": [{"id": "e1"}]})),
            (Platform::Surface, json!({"agents": {"A1": {"trust": 60}}, "mood": 0.4})),
            (
                Platform::Mirror,
                json!({"timeline": [{"id": "e1"}], "mood": 0.45, "validations": {"kyc": false}}),
            ),
            (Platform::Protocol, json!({"validations": {"kyc": true}})),
        ])
    }

    #[test]
    fn agent_trust_resolved_to_runtime() {
        let snap = merge(&four_nodes(), "authority-priority");
        assert_eq!(snap.document()["agents"]["A1"]["trust"], json!(80));
        let prov = snap.provenance_of("agents.A1").unwrap();
        assert_eq!(prov.to_string(), "runtime (resolved over surface)");
        assert_eq!(prov.contributors, vec![Platform::Runtime, Platform::Surface]);
        assert!(snap.is_fully_resolved());
    }

    #[test]
    fn validation_outcome_depends_on_strategy() {
        let s = four_nodes();
        let authority = merge(&s, "authority-priority");
        assert_eq!(authority.document()["validations"]["kyc"], json!(true));

        let mirror = merge(&s, "mirror-authority");
        assert_eq!(mirror.document()["validations"]["kyc"], json!(false));
        assert_eq!(
            mirror.provenance_of("validations.kyc").unwrap().to_string(),
            "mirror (resolved over protocol)"
        );
        // Mirror has no agents, so that conflict keeps the runtime baseline.
        assert_eq!(mirror.document()["agents"]["A1"]["trust"], json!(80));
        assert_eq!(mirror.unresolved(), ["agents.A1".to_string()]);
    }

    #[test]
    fn manual_keeps_every_baseline() {
        let snap = merge(&four_nodes(), "manual");
        assert_eq!(snap.document()["agents"]["A1"]["trust"], json!(80));
        assert_eq!(snap.document()["validations"]["kyc"], json!(true));
        assert_eq!(snap.unresolved(), ["agents.A1".to_string(), "validations.kyc".to_string()]);
        assert_eq!(
            snap.provenance_of("validations.kyc").unwrap().to_string(),
            "protocol (unresolved, conflict c-0002)"
        );
        assert!(!snap.is_fully_resolved());
    }

    #[test]
    fn untouched_domains_pass_through_from_baseline() {
        let snap = merge(&four_nodes(), "authority-priority");
        assert_eq!(snap.document()["mood"], json!(0.4));
        assert_eq!(snap.provenance_of("mood").unwrap().to_string(), "surface");
        assert_eq!(snap.provenance_of("timeline").unwrap().source, Some(Platform::Mirror));
    }

    #[test]
    fn missing_node_falls_back_to_remaining_sources() {
        let s = states(&[
            (Platform::Runtime, json!({"agents": {"A1": {"trust": 80}}, "timeline": [{"id": "e1"}]})),
            (Platform::Surface, json!({"agents": {"A1": {"trust": 80}}, "mood": 0.4})),
            (Platform::Protocol, json!({"validations": {"kyc": true}})),
        ]);
        let snap = merge(&s, "authority-priority");
        let timeline = snap.provenance_of("timeline").unwrap();
        assert_eq!(timeline.source, Some(Platform::Runtime));
        assert_eq!(timeline.contributors, vec![Platform::Runtime]);
        assert_eq!(snap.provenance_of("agents").unwrap().contributors, vec![Platform::Runtime, Platform::Surface]);
        assert!(snap.conflicts().is_empty());
    }

    #[test]
    fn untracked_domain_uses_canonical_order() {
        let s = states(&[
            (Platform::Mirror, json!({"notes": "from mirror"})),
            (Platform::Surface, json!({"notes": "from surface"})),
        ]);
        let snap = merge(&s, "manual");
        assert_eq!(snap.document()["notes"], json!("from surface"));
    }

    #[test]
    fn resolution_bookkeeping_is_enforced() {
        let s = four_nodes();
        let rules = MergeRules::default();
        let conflicts = ConflictDetector::with_default_rules(&rules).detect(&s);
        let resolutions = ConflictResolver::with_builtin_strategies(&rules)
            .resolve_all(&conflicts, &s, "manual")
            .unwrap();
        let unifier = StateUnifier::new(rules);

        let err = unifier.unify(&s, &conflicts, &resolutions[..1]).unwrap_err();
        assert!(matches!(err, MergeError::ResolutionCount { count: 0, .. }));

        let mut doubled = resolutions.clone();
        doubled.push(resolutions[0].clone());
        let err = unifier.unify(&s, &conflicts, &doubled).unwrap_err();
        assert!(matches!(err, MergeError::ResolutionCount { count: 2, .. }));

        let err = unifier.unify(&s, &[], &resolutions).unwrap_err();
        assert!(matches!(err, MergeError::UnknownConflict(_)));
    }

    #[test]
    fn list_form_entry_replaced_in_place() {
        let s = states(&[
            (Platform::Runtime, json!({"agents": [{"id": "A1", "trust": 80}, {"id": "A2", "trust": 1}]})),
            (Platform::Surface, json!({"agents": [{"id": "A1", "trust": 60}]})),
        ]);
        let conflict = Conflict {
            id: "c-0001".into(),
            kind: ConflictKind::EntityMismatch,
            severity: Severity::Medium,
            description: "agent A1 differs".into(),
            domain: "agents".into(),
            key: Some("A1".into()),
            left: Fragment::new(Platform::Runtime, json!({"id": "A1", "trust": 80})),
            right: Fragment::new(Platform::Surface, json!({"id": "A1", "trust": 60})),
        };
        let resolution = Resolution::resolved(&conflict, "test", Platform::Surface, json!({"id": "A1", "trust": 60}), "test");
        let snap = StateUnifier::default()
            .unify(&s, &[conflict], &[resolution])
            .unwrap();
        assert_eq!(
            snap.document()["agents"],
            json!([{"id": "A1", "trust": 60}, {"id": "A2", "trust": 1}])
        );
    }

    #[test]
    fn keyed_winner_keeps_list_record_identity() {
        let s = states(&[
            (
                Platform::Runtime,
                json!({"agents": [{"id": "A1", "trust": 60, "updated_at": "2024-01-01T00:00:00Z"}]}),
            ),
            (
                Platform::Surface,
                json!({"agents": {"A1": {"trust": 80, "updated_at": "2025-01-01T00:00:00Z"}}}),
            ),
        ]);
        let snap = merge(&s, "latest-timestamp");
        assert_eq!(
            snap.document()["agents"],
            json!([{"id": "A1", "trust": 80, "updated_at": "2025-01-01T00:00:00Z"}])
        );
        assert_eq!(
            snap.provenance_of("agents.A1").unwrap().to_string(),
            "surface (resolved over runtime)"
        );
    }

    #[test]
    fn entry_missing_from_list_baseline_is_appended_with_id() {
        let s = states(&[
            (Platform::Runtime, json!({"agents": [{"id": "A2", "trust": 1}]})),
            (Platform::Surface, json!({"agents": {"A1": {"trust": 60}}})),
        ]);
        let conflict = Conflict {
            id: "c-0001".into(),
            kind: ConflictKind::EntityMismatch,
            severity: Severity::Medium,
            description: "agent A1 differs".into(),
            domain: "agents".into(),
            key: Some("A1".into()),
            left: Fragment::new(Platform::Runtime, json!({"trust": 50})),
            right: Fragment::new(Platform::Surface, json!({"trust": 60})),
        };
        let resolution = Resolution::resolved(&conflict, "test", Platform::Surface, json!({"trust": 60}), "test");
        let snap = StateUnifier::default()
            .unify(&s, &[conflict], &[resolution])
            .unwrap();
        assert_eq!(
            snap.document()["agents"],
            json!([{"id": "A2", "trust": 1}, {"id": "A1", "trust": 60}])
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn doc() -> impl Strategy<Value = Value> {
            (
                prop::collection::btree_map("A[0-9]", 0i64..100, 0..4),
                prop::collection::vec("e[0-9]", 0..4),
                0.0f64..1.0,
                prop::collection::btree_map("v[0-3]", any::<bool>(), 0..3),
            )
                .prop_map(|(agents, events, mood, validations)| {
                    let agents: Map<String, Value> = agents
                        .into_iter()
                        .map(|(k, t)| (k, json!({"trust": t})))
                        .collect();
                    let timeline: Vec<Value> = events.into_iter().map(|e| json!({"id": e})).collect();
                    json!({
                        "agents": agents,
                        "timeline": timeline,
                        "mood": mood,
                        "validations": validations,
                    })
                })
        }

        proptest! {
            #[test]
            fn merge_is_deterministic(
                docs in prop::collection::vec(doc(), 4),
                strategy in prop::sample::select(vec!["authority-priority", "mirror-authority", "latest-timestamp", "manual"]),
            ) {
                let s = states(&[
                    (Platform::Runtime, docs[0].clone()),
                    (Platform::Surface, docs[1].clone()),
                    (Platform::Mirror, docs[2].clone()),
                    (Platform::Protocol, docs[3].clone()),
                ]);
                let a = merge(&s, strategy);
                let b = merge(&s, strategy);
                prop_assert_eq!(a.digest(), b.digest());
                prop_assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
            }

            #[test]
            fn identical_states_merge_to_themselves(d in doc()) {
                let s = states(&Platform::ALL.map(|p| (p, d.clone())));
                let snap = merge(&s, "authority-priority");
                prop_assert!(snap.conflicts().is_empty());
                prop_assert_eq!(snap.document(), s[&Platform::Runtime].document());
            }
        }
    }
}
