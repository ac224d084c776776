use conflux_types::{ConflictKind, Platform, Severity};
use serde_json::Value;

use crate::rule::{DetectionRule, Finding};

/// Mood/sentiment appears in both the surface and mirror exports.
///
/// Intensities are compared numerically and flagged only when they differ
/// by more than `tolerance`. Mood may be a bare number or a record with an
/// `intensity` field; anything else is compared structurally.
pub struct MoodDriftRule {
    tolerance: f64,
}

impl MoodDriftRule {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

fn intensity(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("intensity").and_then(Value::as_f64),
        _ => None,
    }
}

impl DetectionRule for MoodDriftRule {
    fn name(&self) -> &str {
        "mood-drift"
    }

    fn domain(&self) -> &str {
        "mood"
    }

    fn sources(&self) -> (Platform, Platform) {
        (Platform::Surface, Platform::Mirror)
    }

    fn kind(&self) -> ConflictKind {
        ConflictKind::ScalarDrift
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn compare(&self, left: &Value, right: &Value) -> Vec<Finding> {
        match (intensity(left), intensity(right)) {
            (Some(l), Some(r)) => {
                let drift = (l - r).abs();
                if drift > self.tolerance {
                    vec![Finding::whole(
                        left,
                        right,
                        format!("mood intensity drift {drift:.3} exceeds tolerance {}", self.tolerance),
                    )]
                } else {
                    Vec::new()
                }
            }
            _ if left == right => Vec::new(),
            _ => vec![Finding::whole(left, right, "mood values are not comparable")],
        }
    }
}
