use conflux_types::{ConflictKind, Platform, Severity};
use serde_json::Value;

/// One disagreement found by a rule, before it becomes a `Conflict`.
#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    /// Entry key inside the domain, for keyed domains.
    pub key: Option<String>,
    pub left: Value,
    pub right: Value,
    pub description: String,
}

impl Finding {
    /// A disagreement over the whole domain value.
    pub fn whole(left: &Value, right: &Value, description: impl Into<String>) -> Self {
        Self {
            key: None,
            left: left.clone(),
            right: right.clone(),
            description: description.into(),
        }
    }

    /// A disagreement over one keyed entry.
    pub fn entry(key: impl Into<String>, left: &Value, right: &Value, description: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            left: left.clone(),
            right: right.clone(),
            description: description.into(),
        }
    }
}

/// A comparison rule for one domain that two platforms both report.
///
/// Rules are pure: `compare` sees only the two domain values and must
/// return the same findings, in the same order, for the same inputs.
pub trait DetectionRule: Send + Sync {
    /// Human-readable rule name (e.g., "agent-records").
    fn name(&self) -> &str;

    /// The domain this rule compares.
    fn domain(&self) -> &str;

    /// The two platforms compared, left first.
    fn sources(&self) -> (Platform, Platform);

    fn kind(&self) -> ConflictKind;

    fn severity(&self) -> Severity;

    /// Compare the two domain values and report every disagreement.
    fn compare(&self, left: &Value, right: &Value) -> Vec<Finding>;
}
