use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::platform::Platform;

/// Closed set of conflict kinds raised by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// Two structured records for the same entity differ.
    EntityMismatch,
    /// Two ordered sequences diverge in length or element identity.
    SequenceDivergence,
    /// Two scalars differ by more than the allowed tolerance.
    ScalarDrift,
    /// Two sources disagree on a per-item outcome (validation results).
    RecordDisagreement,
}

impl ConflictKind {
    pub const ALL: [ConflictKind; 4] = [
        ConflictKind::EntityMismatch,
        ConflictKind::SequenceDivergence,
        ConflictKind::ScalarDrift,
        ConflictKind::RecordDisagreement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityMismatch => "entity-mismatch",
            Self::SequenceDivergence => "sequence-divergence",
            Self::ScalarDrift => "scalar-drift",
            Self::RecordDisagreement => "record-disagreement",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity-mismatch" => Ok(Self::EntityMismatch),
            "sequence-divergence" => Ok(Self::SequenceDivergence),
            "scalar-drift" => Ok(Self::ScalarDrift),
            // Validation outcomes are the only per-item records compared today.
            "record-disagreement" | "validation-disagreement" => Ok(Self::RecordDisagreement),
            other => Err(TypeError::UnknownConflictKind(other.to_string())),
        }
    }
}

/// Conflict severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One side of a conflict: a raw value as one platform reported it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub platform: Platform,
    pub value: Value,
    /// The most recent mutation time recorded in the value, if any.
    pub mutated_at: Option<DateTime<Utc>>,
}

impl Fragment {
    pub fn new(platform: Platform, value: Value) -> Self {
        let mutated_at = mutation_time(&value);
        Self {
            platform,
            value,
            mutated_at,
        }
    }
}

/// A detected disagreement between two nodes' views of the same entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Deterministic identifier assigned in detection order (`c-0001`).
    pub id: String,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    /// The domain the conflict lives in.
    pub domain: String,
    /// Entry key inside the domain, for keyed domains.
    pub key: Option<String>,
    pub left: Fragment,
    pub right: Fragment,
}

impl Conflict {
    /// Dotted path of the conflicting field (`agents.A1`, `timeline`).
    pub fn path(&self) -> String {
        match &self.key {
            Some(k) => format!("{}.{k}", self.domain),
            None => self.domain.clone(),
        }
    }

    /// The fragment reported by `platform`, if it is one of the two sides.
    pub fn fragment_for(&self, platform: Platform) -> Option<&Fragment> {
        if self.left.platform == platform {
            Some(&self.left)
        } else if self.right.platform == platform {
            Some(&self.right)
        } else {
            None
        }
    }

    /// Both platforms involved, left first.
    pub fn platforms(&self) -> [Platform; 2] {
        [self.left.platform, self.right.platform]
    }
}

/// Field names that carry a record's last mutation time.
const MUTATION_FIELDS: [&str; 4] = ["updated_at", "updatedAt", "modified_at", "timestamp"];

/// Extract the most recent mutation time from a value.
///
/// Records are searched for a known timestamp field (RFC 3339 string or
/// epoch milliseconds). For lists, the last entry's time is used.
pub fn mutation_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => MUTATION_FIELDS
            .iter()
            .find_map(|f| map.get(*f).and_then(parse_time)),
        Value::Array(items) => items.last().and_then(mutation_time),
        _ => None,
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_names_round_trip() {
        for kind in ConflictKind::ALL {
            assert_eq!(kind.as_str().parse::<ConflictKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                Value::String(kind.as_str().into())
            );
        }
    }

    #[test]
    fn validation_disagreement_alias() {
        assert_eq!(
            "validation-disagreement".parse::<ConflictKind>().unwrap(),
            ConflictKind::RecordDisagreement
        );
    }

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn mutation_time_from_rfc3339() {
        let t = mutation_time(&json!({"updated_at": "2024-05-01T12:00:00Z"})).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn mutation_time_from_epoch_millis() {
        let t = mutation_time(&json!({"timestamp": 1_700_000_000_000i64})).unwrap();
        assert_eq!(t.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn mutation_time_uses_last_list_entry() {
        let v = json!([
            {"id": "e1", "timestamp": "2024-01-01T00:00:00Z"},
            {"id": "e2", "timestamp": "2024-02-01T00:00:00Z"}
        ]);
        assert_eq!(mutation_time(&v).unwrap().to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }

    #[test]
    fn mutation_time_absent_for_scalars() {
        assert!(mutation_time(&json!(0.5)).is_none());
        assert!(mutation_time(&json!({"trust": 80})).is_none());
        assert!(mutation_time(&json!({"updated_at": "yesterday"})).is_none());
    }

    #[test]
    fn conflict_path_and_fragments() {
        let c = Conflict {
            id: "c-0001".into(),
            kind: ConflictKind::EntityMismatch,
            severity: Severity::Medium,
            description: "agent A1 differs".into(),
            domain: "agents".into(),
            key: Some("A1".into()),
            left: Fragment::new(Platform::Runtime, json!({"trust": 80})),
            right: Fragment::new(Platform::Surface, json!({"trust": 60})),
        };
        assert_eq!(c.path(), "agents.A1");
        assert_eq!(c.fragment_for(Platform::Surface).unwrap().value, json!({"trust": 60}));
        assert!(c.fragment_for(Platform::Mirror).is_none());
        assert_eq!(c.platforms(), [Platform::Runtime, Platform::Surface]);
    }
}
