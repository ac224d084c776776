//! Merge engine for Conflux.
//!
//! Turns a set of captured [`NodeState`]s into a [`UnifiedSnapshot`] in
//! three pure, deterministic steps:
//!
//! 1. [`ConflictDetector`] runs a fixed, extensible list of
//!    [`DetectionRule`]s, one per domain that two platforms both report.
//! 2. [`ConflictResolver`] applies one named [`ResolutionStrategy`] from a
//!    [`StrategyTable`] to every conflict.
//! 3. [`StateUnifier`] starts each domain from its baseline platform and
//!    overlays successful resolutions, recording provenance per field.
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use conflux_merge::{ConflictDetector, ConflictResolver, MergeRules, StateUnifier};
//! use conflux_types::{NodeState, Platform};
//! use serde_json::json;
//!
//! let now = chrono::Utc::now();
//! let mut states = BTreeMap::new();
//! states.insert(Platform::Runtime, NodeState::from_json(Platform::Runtime, now, json!({"agents": {"A1": {"trust": 80}}})));
//! states.insert(Platform::Surface, NodeState::from_json(Platform::Surface, now, json!({"agents": {"A1": {"trust": 60}}})));
//!
//! let rules = MergeRules::default();
//! let conflicts = ConflictDetector::with_default_rules(&rules).detect(&states);
//! let resolutions = ConflictResolver::with_builtin_strategies(&rules)
//!     .resolve_all(&conflicts, &states, "authority-priority")
//!     .unwrap();
//! let snapshot = StateUnifier::new(rules).unify(&states, &conflicts, &resolutions).unwrap();
//! assert_eq!(snapshot.document()["agents"]["A1"]["trust"], json!(80));
//! ```
//!
//! [`NodeState`]: conflux_types::NodeState
//! [`UnifiedSnapshot`]: conflux_types::UnifiedSnapshot

pub mod config;
pub mod detector;
pub mod error;
pub mod resolver;
pub mod rule;
pub mod rules;
pub mod strategies;
pub mod strategy;
pub mod unifier;

pub use config::{MergeRules, OwnershipTable};
pub use detector::ConflictDetector;
pub use error::{MergeError, MergeResult};
pub use resolver::ConflictResolver;
pub use rule::{DetectionRule, Finding};
pub use rules::{AgentRecordRule, MoodDriftRule, TimelineRule, ValidationRule};
pub use strategies::{AuthorityPriority, LatestTimestamp, Manual, MirrorAuthority};
pub use strategy::{CapturedStates, ResolutionStrategy, StrategyKind, StrategyTable};
pub use unifier::StateUnifier;
