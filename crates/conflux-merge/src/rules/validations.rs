use conflux_types::state::keyed_entries;
use conflux_types::{ConflictKind, Platform, Severity};
use serde_json::Value;

use crate::rule::{DetectionRule, Finding};

/// Validation/compliance records appear in both the protocol and mirror
/// exports.
///
/// One conflict is raised per validation item whose boolean outcome
/// differs between the two sources. Items reported by one side only, or
/// whose outcome cannot be read, are skipped.
pub struct ValidationRule;

const OUTCOME_FIELDS: [&str; 3] = ["passed", "valid", "ok"];

fn outcome(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Object(map) => OUTCOME_FIELDS
            .iter()
            .find_map(|f| map.get(*f).and_then(Value::as_bool)),
        _ => None,
    }
}

impl DetectionRule for ValidationRule {
    fn name(&self) -> &str {
        "validation-outcomes"
    }

    fn domain(&self) -> &str {
        "validations"
    }

    fn sources(&self) -> (Platform, Platform) {
        (Platform::Protocol, Platform::Mirror)
    }

    fn kind(&self) -> ConflictKind {
        ConflictKind::RecordDisagreement
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn compare(&self, left: &Value, right: &Value) -> Vec<Finding> {
        let (Some(l), Some(r)) = (keyed_entries(left), keyed_entries(right)) else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for (id, lv) in &l {
            let Some(rv) = r.get(id) else { continue };
            if let (Some(lo), Some(ro)) = (outcome(lv), outcome(rv)) {
                if lo != ro {
                    findings.push(Finding::entry(
                        id.clone(),
                        lv,
                        rv,
                        format!("validation {id}: protocol says {lo}, mirror says {ro}"),
                    ));
                }
            }
        }
        findings
    }
}
