use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conflict::Conflict;
use crate::platform::Platform;

/// The policy-driven outcome chosen for one conflict.
///
/// Build through [`Resolution::resolved`] or [`Resolution::unresolved`]:
/// an unsuccessful resolution always requires manual resolution and never
/// carries a value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub conflict_id: String,
    /// Dotted path of the conflicting field.
    pub path: String,
    /// Name of the strategy that produced this outcome.
    pub strategy: String,
    pub resolved_value: Option<Value>,
    /// The platform whose value won, if any.
    pub winner: Option<Platform>,
    pub success: bool,
    pub requires_manual_resolution: bool,
    pub explanation: String,
}

impl Resolution {
    /// A successful resolution in favour of `winner`.
    pub fn resolved(
        conflict: &Conflict,
        strategy: impl Into<String>,
        winner: Platform,
        value: Value,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            conflict_id: conflict.id.clone(),
            path: conflict.path(),
            strategy: strategy.into(),
            resolved_value: Some(value),
            winner: Some(winner),
            success: true,
            requires_manual_resolution: false,
            explanation: explanation.into(),
        }
    }

    /// A resolution the strategy could not decide.
    pub fn unresolved(
        conflict: &Conflict,
        strategy: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            conflict_id: conflict.id.clone(),
            path: conflict.path(),
            strategy: strategy.into(),
            resolved_value: None,
            winner: None,
            success: false,
            requires_manual_resolution: true,
            explanation: explanation.into(),
        }
    }
}
