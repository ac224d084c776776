use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use conflux_types::{Conflict, NodeState, Platform, Resolution};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MergeRules;
use crate::error::MergeError;
use crate::strategies::{AuthorityPriority, LatestTimestamp, Manual, MirrorAuthority};

/// The captured node states a merge works from, keyed by platform.
pub type CapturedStates = BTreeMap<Platform, NodeState>;

/// A policy that turns one conflict into a resolution.
///
/// Strategies never fail: a conflict the strategy cannot decide is
/// returned as an unsuccessful [`Resolution`] that requires manual
/// resolution.
pub trait ResolutionStrategy: Send + Sync {
    /// Name the strategy is registered under.
    fn name(&self) -> &str;

    /// Resolve one conflict. `states` holds every captured node state, not
    /// just the two sides of the conflict.
    fn resolve(&self, conflict: &Conflict, states: &CapturedStates) -> Resolution;
}

/// The built-in strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// The statically configured owner of each conflict kind wins.
    #[default]
    AuthorityPriority,
    /// The mirror node always wins.
    MirrorAuthority,
    /// The most recently mutated fragment wins.
    LatestTimestamp,
    /// Nothing is resolved automatically.
    Manual,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::AuthorityPriority,
        StrategyKind::MirrorAuthority,
        StrategyKind::LatestTimestamp,
        StrategyKind::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorityPriority => "authority-priority",
            Self::MirrorAuthority => "mirror-authority",
            Self::LatestTimestamp => "latest-timestamp",
            Self::Manual => "manual",
        }
    }

    /// One-line summary of the policy.
    pub fn description(&self) -> &'static str {
        match self {
            Self::AuthorityPriority => "owner of the conflict kind wins",
            Self::MirrorAuthority => "mirror node always wins",
            Self::LatestTimestamp => "most recently mutated side wins",
            Self::Manual => "nothing is resolved automatically",
        }
    }

    /// Build the strategy this kind names.
    pub fn build(&self, rules: &MergeRules) -> Arc<dyn ResolutionStrategy> {
        match self {
            Self::AuthorityPriority => Arc::new(AuthorityPriority::new(rules.ownership.clone())),
            Self::MirrorAuthority => Arc::new(MirrorAuthority),
            Self::LatestTimestamp => Arc::new(LatestTimestamp),
            Self::Manual => Arc::new(Manual),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MergeError::UnknownStrategy(s.to_string()))
    }
}

/// Registered strategies, keyed by name.
#[derive(Clone, Default)]
pub struct StrategyTable {
    strategies: BTreeMap<String, Arc<dyn ResolutionStrategy>>,
}

impl StrategyTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding every [`StrategyKind`].
    pub fn builtin(rules: &MergeRules) -> Self {
        let mut table = Self::new();
        for kind in StrategyKind::ALL {
            table.insert(kind.build(rules));
        }
        table
    }

    /// Register a strategy under its own name, replacing any previous
    /// strategy with that name.
    pub fn register<S: ResolutionStrategy + 'static>(&mut self, strategy: S) {
        self.insert(Arc::new(strategy));
    }

    fn insert(&mut self, strategy: Arc<dyn ResolutionStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ResolutionStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for StrategyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyTable")
            .field("strategies", &self.names())
            .finish()
    }
}

/// The value `platform` holds for the conflicting field.
///
/// Taken from the conflict itself when `platform` is one of its sides,
/// otherwise looked up in that platform's captured state.
pub fn value_for(conflict: &Conflict, states: &CapturedStates, platform: Platform) -> Option<Value> {
    if let Some(fragment) = conflict.fragment_for(platform) {
        return Some(fragment.value.clone());
    }
    states
        .get(&platform)?
        .value_at(&conflict.domain, conflict.key.as_deref())
        .cloned()
}

/// Resolve in favour of `platform`, or fail as manual if it has no value
/// for the field.
pub(crate) fn award(
    conflict: &Conflict,
    states: &CapturedStates,
    strategy: &str,
    platform: Platform,
    reason: &str,
) -> Resolution {
    match value_for(conflict, states, platform) {
        Some(value) => Resolution::resolved(
            conflict,
            strategy,
            platform,
            value,
            format!("{platform} wins: {reason}"),
        ),
        None => Resolution::unresolved(
            conflict,
            strategy,
            format!("{platform} should win ({reason}) but reported no value for {}", conflict.path()),
        ),
    }
}
