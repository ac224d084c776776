//! Foundation types for Conflux.
//!
//! This crate provides the identity, state, conflict, and snapshot types
//! shared by every stage of a platform merge. Every other Conflux crate
//! depends on `conflux-types`.
//!
//! # Key Types
//!
//! - [`Platform`]: One of the four participating services
//! - [`SessionId`]: UUID v7 merge session identifier
//! - [`NodeState`]: Immutable domain-keyed export captured from one node
//! - [`Conflict`]: Typed disagreement between two nodes' fragments
//! - [`Resolution`]: Policy outcome for one conflict
//! - [`UnifiedSnapshot`]: Merged document with provenance and audit log
//! - [`Phase`]: Merge session state machine

pub mod command;
pub mod conflict;
pub mod error;
pub mod phase;
pub mod platform;
pub mod resolution;
pub mod snapshot;
pub mod state;

pub use command::{CheckpointFlags, CommandAck, CommandKind, NodeCommand};
pub use conflict::{Conflict, ConflictKind, Fragment, Severity};
pub use error::TypeError;
pub use phase::{NodeStatus, Phase};
pub use platform::{Platform, SessionId};
pub use resolution::Resolution;
pub use snapshot::{FieldProvenance, UnifiedSnapshot};
pub use state::{ExportOptions, NodeState, StateDocument};
