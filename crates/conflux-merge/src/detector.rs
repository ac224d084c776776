use tracing::debug;

use conflux_types::{Conflict, Fragment};

use crate::config::MergeRules;
use crate::rule::DetectionRule;
use crate::rules::{AgentRecordRule, MoodDriftRule, TimelineRule, ValidationRule};
use crate::strategy::CapturedStates;

/// Runs an ordered list of detection rules over captured node states.
///
/// Detection is pure and deterministic: rules run in registration order,
/// findings keep the order each rule returns them in, and conflict ids are
/// assigned sequentially (`c-0001`, `c-0002`, ...).
pub struct ConflictDetector {
    rules: Vec<Box<dyn DetectionRule>>,
}

impl ConflictDetector {
    /// A detector with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rule set:
    /// agent records -> timeline -> mood -> validations.
    pub fn with_default_rules(config: &MergeRules) -> Self {
        let mut detector = Self::new();
        detector.add_rule(Box::new(AgentRecordRule));
        detector.add_rule(Box::new(TimelineRule));
        detector.add_rule(Box::new(MoodDriftRule::new(config.mood_tolerance)));
        detector.add_rule(Box::new(ValidationRule));
        detector
    }

    /// Append a rule to the end of the list.
    pub fn add_rule(&mut self, rule: Box<dyn DetectionRule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Detect every conflict across the captured states.
    ///
    /// A rule whose domain is missing from either side is skipped: absence
    /// is not a conflict.
    pub fn detect(&self, states: &CapturedStates) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for rule in &self.rules {
            let (lp, rp) = rule.sources();
            let domain = rule.domain();
            let left = states.get(&lp).and_then(|s| s.domain(domain));
            let right = states.get(&rp).and_then(|s| s.domain(domain));
            let (Some(left), Some(right)) = (left, right) else {
                debug!(rule = rule.name(), "rule skipped: domain missing on one side");
                continue;
            };

            for finding in rule.compare(left, right) {
                let id = format!("c-{:04}", conflicts.len() + 1);
                conflicts.push(Conflict {
                    id,
                    kind: rule.kind(),
                    severity: rule.severity(),
                    description: finding.description,
                    domain: domain.to_string(),
                    key: finding.key,
                    left: Fragment::new(lp, finding.left),
                    right: Fragment::new(rp, finding.right),
                });
            }
        }

        debug!(conflicts = conflicts.len(), "detection complete");
        conflicts
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}
