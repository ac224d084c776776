use std::path::Path;
use std::time::Duration;

use conflux_merge::{MergeRules, StrategyKind};
use conflux_sync::SyncConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Everything a deployment can tune, loadable from one TOML file.
///
/// ```toml
/// strategy = "authority-priority"
/// session_timeout_ms = 60000
/// history_capacity = 64
///
/// [sync]
/// sync_window_ms = 2000
///
/// [rules.ownership]
/// entity_mismatch = "runtime"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Resolution strategy applied to every session.
    pub strategy: String,
    /// Bound on one whole merge attempt, excluding emergency recovery.
    pub session_timeout_ms: u64,
    /// Finished sessions kept for lookup; the oldest is evicted first.
    pub history_capacity: usize,
    pub sync: SyncConfig,
    pub rules: MergeRules,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default().to_string(),
            session_timeout_ms: 60_000,
            history_capacity: 64,
            sync: SyncConfig::default(),
            rules: MergeRules::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SessionResult<String> {
        toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}
